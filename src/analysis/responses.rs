//! Response coverage: best-effort scan for message-send calls whose first
//! argument resolves to a known packet ID.
//!
//! Unlike registration extraction this never fails hard; an argument shape the
//! resolver does not understand is simply skipped, since response-ID
//! provenance is inherently heuristic and false negatives are acceptable.

use crate::analysis::ParsedFile;
use crate::analysis::goast::{
    call_arguments, named_children, node_text, signed_int_value, split_selector,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tree_sitter::Node;

/// Integer values of top-level constant declarations across the whole module,
/// keyed by `<package-import-path>.<ConstName>`.
pub fn collect_const_values(files: &[ParsedFile]) -> HashMap<String, i64> {
    let mut values = HashMap::new();
    for file in files {
        for decl in named_children(file.tree.root_node()) {
            if decl.kind() != "const_declaration" {
                continue;
            }
            for spec in named_children(decl) {
                if spec.kind() != "const_spec" {
                    continue;
                }
                collect_const_spec(spec, file, &mut values);
            }
        }
    }
    values
}

fn collect_const_spec(spec: Node<'_>, file: &ParsedFile, values: &mut HashMap<String, i64>) {
    let mut cursor = spec.walk();
    // The field iterator also yields the anonymous comma tokens between names.
    let names: Vec<Node<'_>> = spec
        .children_by_field_name("name", &mut cursor)
        .filter(|node| node.is_named())
        .collect();
    let value_exprs: Vec<Node<'_>> = match spec.child_by_field_name("value") {
        Some(list) if list.kind() == "expression_list" => named_children(list),
        Some(single) => vec![single],
        None => return,
    };
    for (index, name_node) in names.iter().enumerate() {
        let Some(expr) = value_exprs.get(index) else {
            continue;
        };
        let Some(value) = signed_int_value(*expr, &file.source) else {
            continue;
        };
        let name = node_text(*name_node, &file.source);
        values.insert(format!("{}.{name}", file.import_path), value);
    }
}

/// Packet IDs observed in send calls, mapped to the set of files sending them.
pub fn collect_response_usage(
    files: &[ParsedFile],
    const_values: &HashMap<String, i64>,
) -> BTreeMap<i64, BTreeSet<String>> {
    let mut responses: BTreeMap<i64, BTreeSet<String>> = BTreeMap::new();
    for file in files {
        visit(file.tree.root_node(), file, const_values, &mut responses);
    }
    responses
}

fn visit(
    node: Node<'_>,
    file: &ParsedFile,
    const_values: &HashMap<String, i64>,
    responses: &mut BTreeMap<i64, BTreeSet<String>>,
) {
    if node.kind() == "call_expression"
        && is_send_call(node, &file.source)
        && let Some(first_arg) = call_arguments(node).first()
        && let Some(id) = resolve_packet_id(*first_arg, file, const_values)
    {
        responses
            .entry(id)
            .or_default()
            .insert(file.rel_path.clone());
    }
    for child in named_children(node) {
        visit(child, file, const_values, responses);
    }
}

fn is_send_call(call: Node<'_>, source: &str) -> bool {
    let Some(function) = call.child_by_field_name("function") else {
        return false;
    };
    match function.kind() {
        "identifier" => node_text(function, source) == "SendProtoMessage",
        "selector_expression" => split_selector(function, source)
            .map(|(_, method)| method == "SendMessage" || method == "SendProtoMessage")
            .unwrap_or(false),
        _ => false,
    }
}

/// Resolve a send call's first argument to an integer packet ID: a literal, a
/// signed literal, a constant from the same package, or a package-qualified
/// constant reached through the file's imports.
fn resolve_packet_id(
    expr: Node<'_>,
    file: &ParsedFile,
    const_values: &HashMap<String, i64>,
) -> Option<i64> {
    if let Some(value) = signed_int_value(expr, &file.source) {
        return Some(value);
    }
    match expr.kind() {
        "identifier" => {
            let name = node_text(expr, &file.source);
            const_values
                .get(&format!("{}.{name}", file.import_path))
                .copied()
        }
        "selector_expression" => {
            let (package, name) = split_selector(expr, &file.source)?;
            let import_path = file.import_map.get(&package)?;
            const_values.get(&format!("{import_path}.{name}")).copied()
        }
        _ => None,
    }
}
