//! Shared tree-sitter helpers for walking Go syntax trees.

use anyhow::{Context, Result, bail};
use tree_sitter::{Node, Parser, Tree};

pub struct GoParser {
    parser: Parser,
}

impl GoParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_go::LANGUAGE;
        parser
            .set_language(&language.into())
            .context("load Go grammar")?;
        Ok(Self { parser })
    }

    /// Parse a single file. A tree containing error nodes is treated as a
    /// failed parse: a report built on a partially-parsed tree would be
    /// misleading, so the whole run aborts instead.
    pub fn parse(&mut self, source: &str, origin: &str) -> Result<Tree> {
        let Some(tree) = self.parser.parse(source, None) else {
            bail!("parse {origin}: parser returned no tree");
        };
        if tree.root_node().has_error() {
            bail!("parse {origin}: syntax error");
        }
        Ok(tree)
    }
}

pub fn node_text(node: Node<'_>, source: &str) -> String {
    source
        .get(node.start_byte()..node.end_byte())
        .unwrap_or("")
        .trim()
        .to_string()
}

pub fn line_of(node: Node<'_>) -> i64 {
    node.start_position().row as i64 + 1
}

pub fn named_children<'a>(node: Node<'a>) -> Vec<Node<'a>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Split a `selector_expression` into (operand text, field name).
pub fn split_selector(node: Node<'_>, source: &str) -> Option<(String, String)> {
    if node.kind() != "selector_expression" {
        return None;
    }
    let operand = node.child_by_field_name("operand")?;
    let field = node.child_by_field_name("field")?;
    Some((node_text(operand, source), node_text(field, source)))
}

pub fn call_arguments<'a>(call: Node<'a>) -> Vec<Node<'a>> {
    match call.child_by_field_name("arguments") {
        Some(list) => named_children(list),
        None => Vec::new(),
    }
}

/// Decimal integer literal value. Registration IDs and packet constants are
/// plain decimals in this codebase; anything fancier is out of scope.
pub fn int_literal_value(node: Node<'_>, source: &str) -> Option<i64> {
    if node.kind() != "int_literal" {
        return None;
    }
    node_text(node, source).parse().ok()
}

/// Integer value of a literal or a `+`/`-` prefixed literal.
pub fn signed_int_value(node: Node<'_>, source: &str) -> Option<i64> {
    if let Some(value) = int_literal_value(node, source) {
        return Some(value);
    }
    if node.kind() != "unary_expression" {
        return None;
    }
    let operator = node.child_by_field_name("operator")?;
    let operand = node.child_by_field_name("operand")?;
    let value = int_literal_value(operand, source)?;
    match node_text(operator, source).as_str() {
        "-" => Some(-value),
        "+" => Some(value),
        _ => None,
    }
}

pub fn unquote_go_string(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() < 2 {
        return None;
    }
    if (trimmed.starts_with('"') && trimmed.ends_with('"'))
        || (trimmed.starts_with('`') && trimmed.ends_with('`'))
    {
        return Some(trimmed[1..trimmed.len() - 1].to_string());
    }
    None
}

/// Unwrap `literal_element` wrappers inside composite-literal bodies down to
/// the underlying expression node.
pub fn unwrap_literal_element(node: Node<'_>) -> Node<'_> {
    let mut current = node;
    while current.kind() == "literal_element" {
        match named_children(current).into_iter().next() {
            Some(child) => current = child,
            None => break,
        }
    }
    current
}

/// Unwrap pointer indirection in a type position (`*T` -> `T`).
pub fn unwrap_pointer_type(node: Node<'_>) -> Node<'_> {
    if node.kind() == "pointer_type" {
        if let Some(inner) = named_children(node).into_iter().next() {
            return inner;
        }
    }
    node
}

/// Package/name pair of a type reference (`pkg.Name`). Types appear as
/// `qualified_type` in type positions and `selector_expression` in a few
/// expression positions; both are handled.
pub fn qualified_type_parts(node: Node<'_>, source: &str) -> Option<(String, String)> {
    match node.kind() {
        "qualified_type" => {
            let package = node.child_by_field_name("package")?;
            let name = node.child_by_field_name("name")?;
            Some((node_text(package, source), node_text(name, source)))
        }
        "selector_expression" => split_selector(node, source),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Tree {
        GoParser::new().unwrap().parse(source, "test.go").unwrap()
    }

    fn first_of_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
        if node.kind() == kind {
            return Some(node);
        }
        for child in named_children(node) {
            if let Some(found) = first_of_kind(child, kind) {
                return Some(found);
            }
        }
        None
    }

    #[test]
    fn rejects_broken_source() {
        let err = GoParser::new()
            .unwrap()
            .parse("package main\n\nfunc broken( {", "bad.go")
            .unwrap_err();
        assert!(err.to_string().contains("bad.go"));
    }

    #[test]
    fn signed_literal_values() {
        let source = "package main\n\nvar a = -42\nvar b = +7\nvar c = 9\n";
        let tree = parse(source);
        let root = tree.root_node();
        let unary = first_of_kind(root, "unary_expression").unwrap();
        assert_eq!(signed_int_value(unary, source), Some(-42));
        let literal = first_of_kind(root, "int_literal").unwrap();
        assert_eq!(int_literal_value(literal, source), Some(42));
        assert_eq!(signed_int_value(literal, source), Some(42));
    }

    #[test]
    fn unquotes_strings() {
        assert_eq!(unquote_go_string("\"abc\""), Some("abc".to_string()));
        assert_eq!(unquote_go_string("`raw`"), Some("raw".to_string()));
        assert_eq!(unquote_go_string("abc"), None);
    }

    #[test]
    fn splits_selector() {
        let source = "package main\n\nfunc f() { pkg.Call() }\n";
        let tree = parse(source);
        let selector = first_of_kind(tree.root_node(), "selector_expression").unwrap();
        assert_eq!(
            split_selector(selector, source),
            Some(("pkg".to_string(), "Call".to_string()))
        );
    }
}
