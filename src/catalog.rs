//! Protocol message catalog.
//!
//! The reconciler only needs "a registry of named, numbered message types", so
//! it takes the catalog as a capability rather than reading any global state.
//! The production implementation enumerates type declarations in the generated
//! protocol directory; tests fabricate catalogs from plain name lists.

use crate::analysis::goast::{GoParser, named_children, node_text};
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Name prefix of client-to-server command types.
pub const CS_PREFIX: &str = "CS_";
/// Name prefix of server-to-client response types.
pub const SC_PREFIX: &str = "SC_";

pub trait Catalog {
    /// All known message-type names, prefixed or not; callers filter.
    fn message_names(&self) -> Vec<String>;
}

impl Catalog for Vec<String> {
    fn message_names(&self) -> Vec<String> {
        self.clone()
    }
}

/// Numeric suffix of a message-type name under the given prefix. Only names
/// whose remainder is a non-negative integer count as catalog entries.
pub fn packet_type_id(name: &str, prefix: &str) -> Option<i64> {
    let rest = name.strip_prefix(prefix)?;
    let id: i64 = rest.parse().ok()?;
    if id < 0 { None } else { Some(id) }
}

pub fn known_ids(catalog: &dyn Catalog, prefix: &str) -> BTreeSet<i64> {
    catalog
        .message_names()
        .iter()
        .filter_map(|name| packet_type_id(name, prefix))
        .collect()
}

/// ID to type-name map for one prefix, used to label response reports.
pub fn name_map(catalog: &dyn Catalog, prefix: &str) -> BTreeMap<i64, String> {
    let mut map = BTreeMap::new();
    for name in catalog.message_names() {
        if let Some(id) = packet_type_id(&name, prefix) {
            map.entry(id).or_insert(name);
        }
    }
    map
}

/// Catalog backed by the generated protocol directory: every struct type
/// declared there is a message type.
pub struct ProtoDirCatalog {
    names: Vec<String>,
}

impl ProtoDirCatalog {
    pub fn load(dir: &Path) -> Result<Self> {
        let mut parser = GoParser::new()?;
        let mut names = Vec::new();
        if !dir.is_dir() {
            return Ok(Self { names });
        }
        let walker = WalkBuilder::new(dir)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false)
            .hidden(false)
            .sort_by_file_path(|a, b| a.cmp(b))
            .build();
        for entry in walker {
            let entry = entry.context("walk protocol directory")?;
            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("go") {
                continue;
            }
            let rel = path.to_string_lossy();
            if rel.ends_with("_test.go") {
                continue;
            }
            let source = crate::util::read_to_string(path)?;
            let tree = parser.parse(&source, &rel)?;
            collect_type_names(tree.root_node(), &source, &mut names);
        }
        Ok(Self { names })
    }
}

impl Catalog for ProtoDirCatalog {
    fn message_names(&self) -> Vec<String> {
        self.names.clone()
    }
}

fn collect_type_names(root: tree_sitter::Node<'_>, source: &str, names: &mut Vec<String>) {
    for decl in named_children(root) {
        if decl.kind() != "type_declaration" {
            continue;
        }
        for spec in named_children(decl) {
            if spec.kind() != "type_spec" {
                continue;
            }
            if let Some(name_node) = spec.child_by_field_name("name") {
                let name = node_text(name_node, source);
                if !name.is_empty() {
                    names.push(name);
                }
            }
        }
    }
}
