//! Heuristic Classifier: scores a handler body by the implementation signals
//! it exhibits and maps the score to a status.
//!
//! Signals are purely syntactic. Method names are compared as strings; that is
//! inherent to the heuristic, and the weights that turn signals into a score
//! live in the externally supplied config.

use crate::analysis::goast::{named_children, node_text, qualified_type_parts, split_selector,
    unwrap_pointer_type};
use crate::analysis::imports::{ImportAliases, is_alias};
use crate::heuristics::{HeuristicsConfig, Status};
use std::collections::{BTreeSet, HashSet};
use tree_sitter::Node;

pub const SIG_EMPTY_BODY: &str = "empty_body";
pub const SIG_RETURN_ZERO: &str = "return_zero";
pub const SIG_SEND_MESSAGE: &str = "send_message";
pub const SIG_RESPONSE_STRUCT: &str = "response_struct";
pub const SIG_REQUEST_STRUCT: &str = "request_struct";
pub const SIG_PROTO_SETTER: &str = "proto_setter";
pub const SIG_REQUEST_PARSE: &str = "request_parse";
pub const SIG_PANIC: &str = "panic";
pub const SIG_DB_WRITE: &str = "db_write";
pub const SIG_CLIENT_USAGE: &str = "client_usage";
pub const SIG_COMMANDER_USAGE: &str = "commander_usage";
pub const SIG_ORM_USAGE: &str = "orm_usage";
pub const SIG_MISC_USAGE: &str = "misc_usage";
pub const SIG_MISSING_HANDLER: &str = "missing_handler";
pub const SIG_NO_HANDLERS: &str = "no_handlers";

const DB_WRITE_METHODS: &[&str] = &["Create", "Save", "Update", "Updates", "Delete"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub status: Status,
    pub score: i64,
    pub signals: BTreeSet<String>,
}

impl AnalysisResult {
    /// Classification for a registration whose handler name has no matching
    /// declaration. Expected and reportable, not a tool failure.
    pub fn missing_handler() -> Self {
        Self {
            status: Status::Stub,
            score: 0,
            signals: BTreeSet::from([SIG_MISSING_HANDLER.to_string()]),
        }
    }
}

/// Analyze one function: `params` and `body` come from either a
/// `function_declaration` or a `func_literal`.
pub fn analyze_function(
    params: Option<Node<'_>>,
    body: Option<Node<'_>>,
    source: &str,
    aliases: &ImportAliases,
    cfg: &HeuristicsConfig,
) -> AnalysisResult {
    let mut signals: BTreeSet<String> = BTreeSet::new();
    let client_params = client_param_names(params, source, aliases);

    let (empty_body, return_zero_only) = analyze_returns(body, source);
    if empty_body {
        signals.insert(SIG_EMPTY_BODY.to_string());
    }
    if return_zero_only {
        signals.insert(SIG_RETURN_ZERO.to_string());
    }

    if let Some(body) = body {
        scan_node(body, source, aliases, &client_params, &mut signals);
    }

    let score = score_signals(&signals, cfg);
    let status = if signals.contains(SIG_PANIC) {
        Status::Panic
    } else if score == 0 {
        Status::Stub
    } else if score < cfg.thresholds.implemented_min {
        Status::Partial
    } else {
        Status::Implemented
    };
    AnalysisResult {
        status,
        score,
        signals,
    }
}

/// Weighted sum over the detected signals. Informational signals
/// (`empty_body`, `return_zero`) carry no weight.
pub fn score_signals(signals: &BTreeSet<String>, cfg: &HeuristicsConfig) -> i64 {
    let weights = &cfg.weights;
    let table: &[(&str, i64)] = &[
        (SIG_SEND_MESSAGE, weights.send_message),
        (SIG_RESPONSE_STRUCT, weights.response_struct),
        (SIG_REQUEST_STRUCT, weights.request_struct),
        (SIG_PROTO_SETTER, weights.proto_setter),
        (SIG_REQUEST_PARSE, weights.request_parse),
        (SIG_CLIENT_USAGE, weights.client_usage),
        (SIG_COMMANDER_USAGE, weights.commander_usage),
        (SIG_ORM_USAGE, weights.orm_usage),
        (SIG_MISC_USAGE, weights.misc_usage),
        (SIG_DB_WRITE, weights.db_write),
    ];
    table
        .iter()
        .filter(|(signal, _)| signals.contains(*signal))
        .map(|(_, weight)| weight)
        .sum()
}

fn scan_node(
    node: Node<'_>,
    source: &str,
    aliases: &ImportAliases,
    client_params: &HashSet<String>,
    signals: &mut BTreeSet<String>,
) {
    match node.kind() {
        "call_expression" => inspect_call(node, source, aliases, signals),
        "composite_literal" => {
            if let Some(type_node) = node.child_by_field_name("type") {
                mark_protobuf_type(type_node, source, aliases, signals);
            }
        }
        "var_spec" | "const_spec" => {
            if let Some(type_node) = node.child_by_field_name("type") {
                mark_protobuf_type(type_node, source, aliases, signals);
            }
        }
        "selector_expression" => {
            inspect_selector(node, source, aliases, client_params, signals);
        }
        _ => {}
    }
    for child in named_children(node) {
        scan_node(child, source, aliases, client_params, signals);
    }
}

fn inspect_call(
    call: Node<'_>,
    source: &str,
    aliases: &ImportAliases,
    signals: &mut BTreeSet<String>,
) {
    let Some(function) = call.child_by_field_name("function") else {
        return;
    };
    match function.kind() {
        "identifier" => {
            let name = node_text(function, source);
            if name == "panic" {
                signals.insert(SIG_PANIC.to_string());
            }
            if name == "SendProtoMessage" {
                signals.insert(SIG_SEND_MESSAGE.to_string());
            }
        }
        "selector_expression" => {
            let Some((receiver, method)) = split_selector(function, source) else {
                return;
            };
            if method.starts_with("SendMessage") {
                signals.insert(SIG_SEND_MESSAGE.to_string());
            }
            if is_alias(&receiver, &aliases.proto) {
                if method == "Unmarshal" {
                    signals.insert(SIG_REQUEST_PARSE.to_string());
                } else {
                    signals.insert(SIG_PROTO_SETTER.to_string());
                }
            }
            if receiver == "log" && matches!(method.as_str(), "Fatal" | "Fatalf" | "Fatalln") {
                signals.insert(SIG_PANIC.to_string());
            }
            if DB_WRITE_METHODS.contains(&method.as_str()) {
                signals.insert(SIG_DB_WRITE.to_string());
            }
        }
        _ => {}
    }
}

fn inspect_selector(
    selector: Node<'_>,
    source: &str,
    aliases: &ImportAliases,
    client_params: &HashSet<String>,
    signals: &mut BTreeSet<String>,
) {
    let Some(operand) = selector.child_by_field_name("operand") else {
        return;
    };
    if operand.kind() != "identifier" {
        return;
    }
    let receiver = node_text(operand, source);
    if client_params.contains(&receiver) {
        signals.insert(SIG_CLIENT_USAGE.to_string());
        if let Some(field) = selector.child_by_field_name("field")
            && node_text(field, source) == "Commander"
        {
            signals.insert(SIG_COMMANDER_USAGE.to_string());
        }
    }
    if is_alias(&receiver, &aliases.orm) {
        signals.insert(SIG_ORM_USAGE.to_string());
    }
    if is_alias(&receiver, &aliases.misc) {
        signals.insert(SIG_MISC_USAGE.to_string());
    }
}

/// Mark `response_struct` / `request_struct` when a type reference points at a
/// message type (`<alias>.SC_*` / `<alias>.CS_*`). Pointer indirection is
/// unwrapped first.
fn mark_protobuf_type(
    type_node: Node<'_>,
    source: &str,
    aliases: &ImportAliases,
    signals: &mut BTreeSet<String>,
) {
    let type_node = unwrap_pointer_type(type_node);
    let Some((package, name)) = qualified_type_parts(type_node, source) else {
        return;
    };
    if !is_alias(&package, &aliases.protobuf) {
        return;
    }
    if name.starts_with("SC_") {
        signals.insert(SIG_RESPONSE_STRUCT.to_string());
    }
    if name.starts_with("CS_") {
        signals.insert(SIG_REQUEST_STRUCT.to_string());
    }
}

/// Names of parameters typed `*<connection-alias>.Client`.
fn client_param_names(
    params: Option<Node<'_>>,
    source: &str,
    aliases: &ImportAliases,
) -> HashSet<String> {
    let mut names = HashSet::new();
    let Some(params) = params else {
        return names;
    };
    for decl in named_children(params) {
        if decl.kind() != "parameter_declaration" {
            continue;
        }
        let Some(type_node) = decl.child_by_field_name("type") else {
            continue;
        };
        if !is_connection_client_type(type_node, source, aliases) {
            continue;
        }
        let mut cursor = decl.walk();
        for name_node in decl.children_by_field_name("name", &mut cursor) {
            if !name_node.is_named() {
                continue;
            }
            let name = node_text(name_node, source);
            if !name.is_empty() {
                names.insert(name);
            }
        }
    }
    names
}

fn is_connection_client_type(type_node: Node<'_>, source: &str, aliases: &ImportAliases) -> bool {
    if type_node.kind() != "pointer_type" {
        return false;
    }
    let inner = unwrap_pointer_type(type_node);
    let Some((package, name)) = qualified_type_parts(inner, source) else {
        return false;
    };
    name == "Client" && is_alias(&package, &aliases.connection)
}

/// Trivial-body detection. Returns (empty, return-zero-only): an empty body is
/// only `empty`, and a body qualifies as return-zero-only when every top-level
/// statement is a return whose results are all `nil` or the literal `0`.
fn analyze_returns(body: Option<Node<'_>>, source: &str) -> (bool, bool) {
    let Some(body) = body else {
        return (true, false);
    };
    // A block wraps its statements in a statement_list node.
    let mut statements = named_children(body);
    if statements.len() == 1 && statements[0].kind() == "statement_list" {
        statements = named_children(statements[0]);
    }
    if statements.is_empty() {
        return (true, false);
    }
    let mut return_zero_only = true;
    for statement in statements {
        if statement.kind() != "return_statement" {
            return_zero_only = false;
            continue;
        }
        if !returns_zero(statement, source) {
            return_zero_only = false;
        }
    }
    (false, return_zero_only)
}

fn returns_zero(statement: Node<'_>, source: &str) -> bool {
    named_children(statement)
        .into_iter()
        .flat_map(|child| {
            if child.kind() == "expression_list" {
                named_children(child)
            } else {
                vec![child]
            }
        })
        .all(|expr| is_zero_expr(expr, source))
}

fn is_zero_expr(expr: Node<'_>, source: &str) -> bool {
    match expr.kind() {
        "nil" => true,
        "int_literal" => node_text(expr, source) == "0",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::goast::GoParser;
    use tree_sitter::Tree;

    fn parse(source: &str) -> Tree {
        GoParser::new().unwrap().parse(source, "handler.go").unwrap()
    }

    fn first_function(tree: &Tree) -> Node<'_> {
        named_children(tree.root_node())
            .into_iter()
            .find(|node| node.kind() == "function_declaration")
            .unwrap()
    }

    fn game_aliases() -> ImportAliases {
        ImportAliases {
            protobuf: vec!["protobuf".to_string()],
            proto: vec!["proto".to_string()],
            orm: vec!["orm".to_string()],
            misc: vec!["misc".to_string()],
            connection: vec!["connection".to_string()],
        }
    }

    fn analyze(source: &str) -> AnalysisResult {
        analyze_with(source, &HeuristicsConfig::default())
    }

    fn analyze_with(source: &str, cfg: &HeuristicsConfig) -> AnalysisResult {
        let tree = parse(source);
        let function = first_function(&tree);
        analyze_function(
            function.child_by_field_name("parameters"),
            function.child_by_field_name("body"),
            source,
            &game_aliases(),
            cfg,
        )
    }

    #[test]
    fn panic_dominates_any_score() {
        let source = r#"
package answer

func Handler(buffer *[]byte, client *connection.Client) {
    response := protobuf.SC_12001{}
    client.SendMessage(12001, &response)
    panic("unimplemented")
}
"#;
        let result = analyze(source);
        assert_eq!(result.status, Status::Panic);
        assert!(result.score >= 4);
        assert!(result.signals.contains(SIG_PANIC));
        assert!(result.signals.contains(SIG_SEND_MESSAGE));
    }

    #[test]
    fn log_fatal_counts_as_panic() {
        let source = r#"
package answer

func Handler(buffer *[]byte, client *connection.Client) {
    log.Fatalf("not written yet")
}
"#;
        let result = analyze(source);
        assert_eq!(result.status, Status::Panic);
    }

    #[test]
    fn no_signals_is_a_stub() {
        let source = r#"
package answer

func Handler(buffer *[]byte) {
    x := 1
    _ = x
}
"#;
        let result = analyze(source);
        assert_eq!(result.status, Status::Stub);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn return_nil_only_is_trivial() {
        let source = r#"
package answer

func Handler(buffer *[]byte) error {
    return nil
}
"#;
        let result = analyze(source);
        assert_eq!(result.status, Status::Stub);
        assert_eq!(result.score, 0);
        assert!(result.signals.contains(SIG_RETURN_ZERO));
        assert!(!result.signals.contains(SIG_EMPTY_BODY));
    }

    #[test]
    fn multi_value_zero_return_is_trivial() {
        let source = r#"
package answer

func Handler(buffer *[]byte) (int, int, error) {
    return 0, 0, nil
}
"#;
        let result = analyze(source);
        assert_eq!(result.status, Status::Stub);
        assert!(result.signals.contains(SIG_RETURN_ZERO));
    }

    #[test]
    fn empty_body_flagged() {
        let source = r#"
package answer

func Handler(buffer *[]byte) {
}
"#;
        let result = analyze(source);
        assert!(result.signals.contains(SIG_EMPTY_BODY));
        assert_eq!(result.status, Status::Stub);
    }

    #[test]
    fn mixed_statements_are_not_return_zero() {
        let source = r#"
package answer

func Handler(buffer *[]byte) error {
    x := 1
    _ = x
    return nil
}
"#;
        let result = analyze(source);
        assert!(!result.signals.contains(SIG_RETURN_ZERO));
    }

    #[test]
    fn send_plus_response_struct_reaches_implemented() {
        let source = r#"
package answer

func Handler(buffer *[]byte, client *connection.Client) {
    response := protobuf.SC_12345{}
    client.SendMessage(12345, &response)
}
"#;
        let result = analyze(source);
        // send_message(3) + response_struct(2) + client_usage(1) over threshold 4
        assert_eq!(result.status, Status::Implemented);
        assert!(result.signals.contains(SIG_SEND_MESSAGE));
        assert!(result.signals.contains(SIG_RESPONSE_STRUCT));
        assert!(result.signals.contains(SIG_CLIENT_USAGE));
    }

    #[test]
    fn bare_send_proto_message_counts() {
        let source = r#"
package answer

func Handler(buffer *[]byte) {
    SendProtoMessage(101, nil)
}
"#;
        let result = analyze(source);
        assert!(result.signals.contains(SIG_SEND_MESSAGE));
    }

    #[test]
    fn below_threshold_is_partial() {
        let source = r#"
package answer

func Handler(buffer *[]byte) {
    var request protobuf.CS_10800
    proto.Unmarshal(*buffer, &request)
}
"#;
        let result = analyze(source);
        // request_struct(1) + request_parse(1) = 2 < 4
        assert_eq!(result.status, Status::Partial);
        assert!(result.signals.contains(SIG_REQUEST_STRUCT));
        assert!(result.signals.contains(SIG_REQUEST_PARSE));
    }

    #[test]
    fn proto_methods_other_than_unmarshal_are_setters() {
        let source = r#"
package answer

func Handler(buffer *[]byte) {
    data := proto.Uint32(7)
    _ = data
}
"#;
        let result = analyze(source);
        assert!(result.signals.contains(SIG_PROTO_SETTER));
        assert!(!result.signals.contains(SIG_REQUEST_PARSE));
    }

    #[test]
    fn commander_usage_requires_client_param() {
        let source = r#"
package answer

func Handler(buffer *[]byte, client *connection.Client) {
    commander := client.Commander
    _ = commander
    orm.GormDB.Where("id = ?", 1)
}
"#;
        let result = analyze(source);
        assert!(result.signals.contains(SIG_CLIENT_USAGE));
        assert!(result.signals.contains(SIG_COMMANDER_USAGE));
        assert!(result.signals.contains(SIG_ORM_USAGE));
    }

    #[test]
    fn client_params_sharing_one_type_are_all_tracked() {
        let source = r#"
package answer

func Handler(primary, mirror *connection.Client) {
    mirror.Flush()
}
"#;
        let result = analyze(source);
        assert!(result.signals.contains(SIG_CLIENT_USAGE));
    }

    #[test]
    fn db_write_matched_by_method_name() {
        let source = r#"
package answer

func Handler(buffer *[]byte) {
    database.Save(&record)
}
"#;
        let result = analyze(source);
        assert!(result.signals.contains(SIG_DB_WRITE));
    }

    #[test]
    fn score_is_monotonic_in_weights() {
        let source = r#"
package answer

func Handler(buffer *[]byte, client *connection.Client) {
    response := protobuf.SC_12345{}
    client.SendMessage(12345, &response)
    misc.Shuffle(nil)
}
"#;
        let base = analyze(source);
        let mut raised = HeuristicsConfig::default();
        raised.weights.send_message += 5;
        let bumped = analyze_with(source, &raised);
        assert!(bumped.score > base.score);

        let mut unrelated = HeuristicsConfig::default();
        unrelated.weights.db_write += 50;
        let same = analyze_with(source, &unrelated);
        assert_eq!(same.score, base.score);
    }

    #[test]
    fn missing_handler_classification() {
        let result = AnalysisResult::missing_handler();
        assert_eq!(result.status, Status::Stub);
        assert_eq!(result.score, 0);
        assert!(result.signals.contains(SIG_MISSING_HANDLER));
    }
}
