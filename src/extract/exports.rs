use std::collections::BTreeSet;

use tree_sitter::Node;

use super::unwrap_expression;
use crate::util::txt;

/// Record identifiers exported by an `export ...` statement.
///
/// Re-exports (`export { x } from './y'`) are skipped: they export another
/// file's binding, not a local container.
pub(super) fn collect_export_statement(node: Node, src: &[u8], exported: &mut BTreeSet<String>) {
    if node.child_by_field_name("source").is_some() {
        return;
    }

    if let Some(decl) = node.child_by_field_name("declaration") {
        match decl.kind() {
            "lexical_declaration" | "variable_declaration" => {
                let mut cursor = decl.walk();
                for declarator in decl.named_children(&mut cursor) {
                    if let Some(name) = declarator
                        .child_by_field_name("name")
                        .filter(|n| n.kind() == "identifier")
                    {
                        exported.insert(txt(name, src).to_string());
                    }
                }
            }
            "function_declaration" | "generator_function_declaration" => {
                if let Some(body) = decl.child_by_field_name("body") {
                    returned_identifiers(body, src, exported);
                }
            }
            _ => {}
        }
        return;
    }

    if let Some(value) = node.child_by_field_name("value") {
        exported_identifiers(value, src, exported);
        return;
    }

    let mut cursor = node.walk();
    let mut last_expression = None;
    for child in node.named_children(&mut cursor) {
        if child.kind() == "export_clause" {
            let mut inner = child.walk();
            for spec in child.named_children(&mut inner) {
                if let Some(name) = spec.child_by_field_name("name") {
                    exported.insert(txt(name, src).to_string());
                }
            }
        } else if child.kind() != "comment" {
            last_expression = Some(child);
        }
    }

    // TS `export = router;`
    let is_export_assignment = txt(node, src)
        .strip_prefix("export")
        .is_some_and(|rest| rest.trim_start().starts_with('='));
    if is_export_assignment {
        if let Some(expr) = last_expression {
            exported_identifiers(expr, src, exported);
        }
    }
}

/// True for `module.exports`, `module.exports.x`, `module.exports['x']` and `exports.x`.
pub(super) fn is_module_export_target(left: Node, src: &[u8]) -> bool {
    if !matches!(left.kind(), "member_expression" | "subscript_expression") {
        return false;
    }
    if is_module_exports(left, src) {
        return true;
    }
    let Some(object) = left.child_by_field_name("object") else {
        return false;
    };
    is_module_exports(object, src) || (object.kind() == "identifier" && txt(object, src) == "exports")
}

fn is_module_exports(node: Node, src: &[u8]) -> bool {
    if node.kind() != "member_expression" {
        return false;
    }
    let object = node.child_by_field_name("object");
    let property = node.child_by_field_name("property");
    matches!(
        (object, property),
        (Some(o), Some(p)) if txt(o, src) == "module" && txt(p, src) == "exports"
    )
}

/// Identifiers an exported value ultimately refers to, seen through
/// parentheses, object literals, chained assignments and the return values
/// of arrow/function expressions.
pub(super) fn exported_identifiers(node: Node, src: &[u8], out: &mut BTreeSet<String>) {
    let node = unwrap_expression(node);
    match node.kind() {
        "identifier" => {
            out.insert(txt(node, src).to_string());
        }
        "object" => {
            let mut cursor = node.walk();
            for prop in node.named_children(&mut cursor) {
                match prop.kind() {
                    "shorthand_property_identifier" => {
                        out.insert(txt(prop, src).to_string());
                    }
                    "pair" => {
                        if let Some(value) = prop.child_by_field_name("value") {
                            exported_identifiers(value, src, out);
                        }
                    }
                    _ => {}
                }
            }
        }
        "assignment_expression" => {
            if let Some(right) = node.child_by_field_name("right") {
                exported_identifiers(right, src, out);
            }
        }
        "arrow_function" => {
            if let Some(body) = node.child_by_field_name("body") {
                if body.kind() == "statement_block" {
                    returned_identifiers(body, src, out);
                } else {
                    exported_identifiers(body, src, out);
                }
            }
        }
        "function_expression" | "function" | "generator_function" => {
            if let Some(body) = node.child_by_field_name("body") {
                returned_identifiers(body, src, out);
            }
        }
        _ => {}
    }
}

/// Follow `return` statements of a function body without entering nested functions.
fn returned_identifiers(body: Node, src: &[u8], out: &mut BTreeSet<String>) {
    let mut cursor = body.walk();
    for child in body.named_children(&mut cursor) {
        match child.kind() {
            "return_statement" => {
                if let Some(expr) = child.named_child(0) {
                    exported_identifiers(expr, src, out);
                }
            }
            "arrow_function"
            | "function_expression"
            | "function"
            | "function_declaration"
            | "generator_function"
            | "generator_function_declaration"
            | "class_declaration"
            | "class" => {}
            _ => returned_identifiers(child, src, out),
        }
    }
}
