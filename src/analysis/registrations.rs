//! Registration Extractor: recovers the static packet-handler table.
//!
//! Registrations follow a small closed grammar
//! (`packets.RegisterPacketHandler(<id>, <handlers>)`); anything outside it is
//! a hard error so schema drift surfaces immediately instead of silently
//! under-reporting.

use crate::analysis::ParsedFile;
use crate::analysis::goast::{
    call_arguments, int_literal_value, line_of, named_children, node_text, split_selector,
    unwrap_literal_element,
};
use crate::util::file_base_name;
use anyhow::{Result, bail};
use tree_sitter::Node;

/// Fixed receiver identifier of registration calls. This is an unqualified
/// source convention, not resolved through the import table.
const REGISTRY_IDENT: &str = "packets";

#[derive(Debug, Clone)]
pub struct HandlerRef<'a> {
    pub name: String,
    /// Body of an inline `func` literal, analyzed directly without lookup.
    pub inline: Option<Node<'a>>,
    pub file: &'a str,
    pub line: i64,
}

#[derive(Debug, Clone)]
pub struct PacketRegistration<'a> {
    pub id: i64,
    pub handlers: Vec<HandlerRef<'a>>,
    pub file: &'a str,
    pub line: i64,
    pub source_file: &'a ParsedFile,
}

pub fn extract_registrations<'a>(files: &'a [ParsedFile]) -> Result<Vec<PacketRegistration<'a>>> {
    let mut registrations = Vec::new();
    for file in files {
        visit(file.tree.root_node(), file, &mut registrations)?;
    }
    Ok(registrations)
}

fn visit<'a>(
    node: Node<'a>,
    file: &'a ParsedFile,
    registrations: &mut Vec<PacketRegistration<'a>>,
) -> Result<()> {
    if node.kind() == "call_expression"
        && let Some(registration) = registration_from_call(node, file)?
    {
        registrations.push(registration);
    }
    for child in named_children(node) {
        visit(child, file, registrations)?;
    }
    Ok(())
}

fn registration_from_call<'a>(
    call: Node<'a>,
    file: &'a ParsedFile,
) -> Result<Option<PacketRegistration<'a>>> {
    let Some(function) = call.child_by_field_name("function") else {
        return Ok(None);
    };
    let Some((receiver, method)) = split_selector(function, &file.source) else {
        return Ok(None);
    };
    if receiver != REGISTRY_IDENT {
        return Ok(None);
    }
    if method != "RegisterPacketHandler" && method != "RegisterLocalizedPacketHandler" {
        return Ok(None);
    }
    let args = call_arguments(call);
    if args.len() < 2 {
        return Ok(None);
    }
    let Some(id) = int_literal_value(args[0], &file.source) else {
        bail!(
            "{}:{}: packet id is not an int literal",
            file.rel_path,
            line_of(args[0])
        );
    };
    let handlers = handlers_from_expr(args[1], file)?;
    Ok(Some(PacketRegistration {
        id,
        handlers,
        file: &file.rel_path,
        line: line_of(call),
        source_file: file,
    }))
}

/// Flatten a handlers expression into individual refs: `&x` unwraps, a
/// `LocalizedHandler` literal contributes each of its values, a slice or array
/// literal contributes each element.
fn handlers_from_expr<'a>(expr: Node<'a>, file: &'a ParsedFile) -> Result<Vec<HandlerRef<'a>>> {
    let expr = unwrap_literal_element(expr);
    match expr.kind() {
        "unary_expression" => {
            let operator = expr
                .child_by_field_name("operator")
                .map(|op| node_text(op, &file.source));
            if operator.as_deref() == Some("&")
                && let Some(operand) = expr.child_by_field_name("operand")
            {
                return handlers_from_expr(operand, file);
            }
        }
        "composite_literal" => {
            let Some(type_node) = expr.child_by_field_name("type") else {
                bail!(
                    "{}:{}: unexpected handlers expression",
                    file.rel_path,
                    line_of(expr)
                );
            };
            if is_localized_handler_type(type_node, &file.source) {
                let mut handlers = Vec::new();
                for element in literal_body_elements(expr) {
                    if element.kind() != "keyed_element" {
                        continue;
                    }
                    let Some(value) = keyed_element_value(element) else {
                        continue;
                    };
                    handlers.extend(handlers_from_expr(value, file)?);
                }
                return Ok(handlers);
            }
            if type_node.kind() == "slice_type" || type_node.kind() == "array_type" {
                let mut handlers = Vec::new();
                for element in literal_body_elements(expr) {
                    if element.kind() == "keyed_element" {
                        bail!(
                            "{}:{}: unexpected handlers expression",
                            file.rel_path,
                            line_of(element)
                        );
                    }
                    if let Some(handler) = handler_from_expr(element, file)? {
                        handlers.push(handler);
                    }
                }
                return Ok(handlers);
            }
        }
        _ => {}
    }
    bail!(
        "{}:{}: unexpected handlers expression",
        file.rel_path,
        line_of(expr)
    )
}

fn handler_from_expr<'a>(
    expr: Node<'a>,
    file: &'a ParsedFile,
) -> Result<Option<HandlerRef<'a>>> {
    let expr = unwrap_literal_element(expr);
    let line = line_of(expr);
    match expr.kind() {
        "nil" => Ok(None),
        "identifier" => Ok(Some(HandlerRef {
            name: node_text(expr, &file.source),
            inline: None,
            file: &file.rel_path,
            line,
        })),
        "selector_expression" => {
            let Some((package, name)) = split_selector(expr, &file.source) else {
                bail!(
                    "{}:{}: unsupported handler expression",
                    file.rel_path,
                    line
                );
            };
            Ok(Some(HandlerRef {
                name: format!("{package}.{name}"),
                inline: None,
                file: &file.rel_path,
                line,
            }))
        }
        "func_literal" => Ok(Some(HandlerRef {
            name: format!("inline@{}:{line}", file_base_name(&file.rel_path)),
            inline: Some(expr),
            file: &file.rel_path,
            line,
        })),
        _ => bail!(
            "{}:{}: unsupported handler expression",
            file.rel_path,
            line
        ),
    }
}

fn is_localized_handler_type(type_node: Node<'_>, source: &str) -> bool {
    match type_node.kind() {
        "type_identifier" => node_text(type_node, source) == "LocalizedHandler",
        "qualified_type" => type_node
            .child_by_field_name("name")
            .map(|name| node_text(name, source) == "LocalizedHandler")
            .unwrap_or(false),
        _ => false,
    }
}

fn literal_body_elements<'a>(composite: Node<'a>) -> Vec<Node<'a>> {
    match composite.child_by_field_name("body") {
        Some(body) => named_children(body),
        None => Vec::new(),
    }
}

/// Value side of a `key: value` element. Field names differ across grammar
/// releases, so fall back to the last named child.
fn keyed_element_value<'a>(element: Node<'a>) -> Option<Node<'a>> {
    element
        .child_by_field_name("value")
        .or_else(|| named_children(element).into_iter().last())
}
