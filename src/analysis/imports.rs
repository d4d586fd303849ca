//! Per-file import tables.
//!
//! The classifier only cares about five collaborator packages; everything else
//! is ignored. A file may import the same package more than once under
//! different aliases, so each slot is a list.

use crate::analysis::goast::{named_children, node_text, unquote_go_string};
use std::collections::HashMap;
use tree_sitter::Node;

/// Import paths of the recognized collaborator packages, derived from the
/// analyzed module's path.
#[derive(Debug, Clone)]
pub struct CollaboratorPaths {
    pub protobuf: String,
    pub proto: String,
    pub orm: String,
    pub misc: String,
    pub connection: String,
}

impl CollaboratorPaths {
    pub fn for_module(module_path: &str) -> Self {
        Self {
            protobuf: format!("{module_path}/internal/protobuf"),
            proto: "google.golang.org/protobuf/proto".to_string(),
            orm: format!("{module_path}/internal/orm"),
            misc: format!("{module_path}/internal/misc"),
            connection: format!("{module_path}/internal/connection"),
        }
    }
}

/// Local aliases under which one file refers to the collaborator packages.
#[derive(Debug, Clone, Default)]
pub struct ImportAliases {
    pub protobuf: Vec<String>,
    pub proto: Vec<String>,
    pub orm: Vec<String>,
    pub misc: Vec<String>,
    pub connection: Vec<String>,
}

pub fn is_alias(name: &str, aliases: &[String]) -> bool {
    aliases.iter().any(|alias| alias == name)
}

/// Build the alias table for one parsed file.
pub fn collect_aliases(root: Node<'_>, source: &str, paths: &CollaboratorPaths) -> ImportAliases {
    let mut aliases = ImportAliases::default();
    for_each_import(root, source, |path, name| {
        if path == paths.protobuf {
            aliases.protobuf.push(name);
        } else if path == paths.proto {
            aliases.proto.push(name);
        } else if path == paths.orm {
            aliases.orm.push(name);
        } else if path == paths.misc {
            aliases.misc.push(name);
        } else if path == paths.connection {
            aliases.connection.push(name);
        }
    });
    aliases
}

/// Full alias-to-import-path map, used by the response-constant resolver.
pub fn collect_import_map(root: Node<'_>, source: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for_each_import(root, source, |path, name| {
        map.insert(name, path);
    });
    map
}

fn for_each_import<F: FnMut(String, String)>(root: Node<'_>, source: &str, mut visit: F) {
    for decl in named_children(root) {
        if decl.kind() != "import_declaration" {
            continue;
        }
        each_import_spec(decl, source, &mut visit);
    }
}

fn each_import_spec<F: FnMut(String, String)>(node: Node<'_>, source: &str, visit: &mut F) {
    if node.kind() == "import_spec" {
        let Some(path_node) = node.child_by_field_name("path") else {
            return;
        };
        let Some(path) = unquote_go_string(&node_text(path_node, source)) else {
            return;
        };
        let name = match node.child_by_field_name("name") {
            Some(name_node) => node_text(name_node, source),
            None => default_import_name(&path),
        };
        visit(path, name);
        return;
    }
    for child in named_children(node) {
        each_import_spec(child, source, visit);
    }
}

/// Default package name: the last path segment, as `go/parser` derives it.
fn default_import_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::goast::GoParser;

    const SOURCE: &str = r#"
package answer

import (
    "fmt"
    "game.example/server/internal/protobuf"
    pb "game.example/server/internal/protobuf"
    "game.example/server/internal/orm"
    proto "google.golang.org/protobuf/proto"
    "game.example/server/internal/connection"
)
"#;

    #[test]
    fn recognizes_collaborator_aliases() {
        let mut parser = GoParser::new().unwrap();
        let tree = parser.parse(SOURCE, "imports.go").unwrap();
        let paths = CollaboratorPaths::for_module("game.example/server");
        let aliases = collect_aliases(tree.root_node(), SOURCE, &paths);
        assert_eq!(aliases.protobuf, vec!["protobuf", "pb"]);
        assert_eq!(aliases.orm, vec!["orm"]);
        assert_eq!(aliases.proto, vec!["proto"]);
        assert_eq!(aliases.connection, vec!["connection"]);
        assert!(aliases.misc.is_empty());
    }

    #[test]
    fn import_map_covers_all_imports() {
        let mut parser = GoParser::new().unwrap();
        let tree = parser.parse(SOURCE, "imports.go").unwrap();
        let map = collect_import_map(tree.root_node(), SOURCE);
        assert_eq!(map.get("fmt").map(String::as_str), Some("fmt"));
        assert_eq!(
            map.get("pb").map(String::as_str),
            Some("game.example/server/internal/protobuf")
        );
    }
}
