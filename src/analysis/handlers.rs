//! Handler Resolver: indexes top-level function declarations from the
//! handlers directory so registrations can be matched to their bodies.

use crate::analysis::ParsedFile;
use crate::analysis::goast::{line_of, named_children};
use crate::analysis::scan::HANDLERS_DIR;
use std::collections::HashMap;
use tree_sitter::Node;

#[derive(Debug, Clone)]
pub struct HandlerSource<'a> {
    pub name: String,
    pub file: &'a str,
    pub line: i64,
    /// The `function_declaration` node.
    pub decl: Node<'a>,
    pub source_file: &'a ParsedFile,
}

#[derive(Debug)]
pub struct HandlerIndex<'a> {
    by_name: HashMap<String, HandlerSource<'a>>,
    /// Declarations dropped because an earlier file already claimed the name.
    /// First occurrence wins; the count is surfaced as a diagnostic.
    pub duplicates: i64,
}

impl<'a> HandlerIndex<'a> {
    pub fn build(files: &'a [ParsedFile]) -> Self {
        let mut by_name: HashMap<String, HandlerSource<'a>> = HashMap::new();
        let mut duplicates = 0;
        for file in files {
            if !in_handlers_dir(&file.rel_path) {
                continue;
            }
            for decl in named_children(file.tree.root_node()) {
                if decl.kind() != "function_declaration" {
                    continue;
                }
                let Some(name_node) = decl.child_by_field_name("name") else {
                    continue;
                };
                let name = crate::analysis::goast::node_text(name_node, &file.source);
                if name.is_empty() {
                    continue;
                }
                if by_name.contains_key(&name) {
                    duplicates += 1;
                    eprintln!(
                        "packet-progress: duplicate handler {name} in {} (keeping first)",
                        file.rel_path
                    );
                    continue;
                }
                by_name.insert(
                    name.clone(),
                    HandlerSource {
                        name,
                        file: &file.rel_path,
                        line: line_of(decl),
                        decl,
                        source_file: file,
                    },
                );
            }
        }
        Self {
            by_name,
            duplicates,
        }
    }

    /// Look up a registration's handler reference. Package qualifiers are
    /// stripped (`answer.LoginHandler` matches `LoginHandler`).
    pub fn lookup(&self, name: &str) -> Option<&HandlerSource<'a>> {
        let bare = match name.rsplit_once('.') {
            Some((_, bare)) => bare,
            None => name,
        };
        self.by_name.get(bare)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Component-boundary prefix match, so sibling directories like
/// `internal/answers` do not slip in.
fn in_handlers_dir(rel_path: &str) -> bool {
    rel_path
        .strip_prefix(HANDLERS_DIR)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}
