use tree_sitter::Node;

use crate::model::ImportDescriptor;
use crate::util::{string_literal, txt};

/// Record the bindings of one ES `import` statement (default, named with or
/// without alias, namespace) or TS `import x = require('y')`.
pub(super) fn collect_import_statement(node: Node, src: &[u8], out: &mut Vec<ImportDescriptor>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "import_clause" => {
                let Some(specifier) = node
                    .child_by_field_name("source")
                    .and_then(|s| string_literal(s, src))
                else {
                    continue;
                };
                collect_import_clause(child, src, &specifier, out);
            }
            "import_require_clause" => {
                let specifier = child
                    .child_by_field_name("source")
                    .and_then(|s| string_literal(s, src));
                let local = first_named_of_kind(child, "identifier").map(|n| txt(n, src));
                if let (Some(local), Some(specifier)) = (local, specifier) {
                    out.push(ImportDescriptor::new(local, specifier));
                }
            }
            _ => {}
        }
    }
}

fn collect_import_clause(clause: Node, src: &[u8], specifier: &str, out: &mut Vec<ImportDescriptor>) {
    let mut cursor = clause.walk();
    for part in clause.named_children(&mut cursor) {
        match part.kind() {
            "identifier" => out.push(ImportDescriptor::new(txt(part, src), specifier)),
            "namespace_import" => {
                if let Some(ident) = first_named_of_kind(part, "identifier") {
                    out.push(ImportDescriptor::new(txt(ident, src), specifier));
                }
            }
            "named_imports" => {
                let mut inner = part.walk();
                for spec in part.named_children(&mut inner) {
                    if spec.kind() != "import_specifier" {
                        continue;
                    }
                    let local = spec
                        .child_by_field_name("alias")
                        .or_else(|| spec.child_by_field_name("name"));
                    if let Some(local) = local {
                        out.push(ImportDescriptor::new(txt(local, src), specifier));
                    }
                }
            }
            _ => {}
        }
    }
}

/// `require('<specifier>')` with a string-literal argument.
pub(super) fn require_specifier(node: Node, src: &[u8]) -> Option<String> {
    if node.kind() != "call_expression" {
        return None;
    }
    let callee = node.child_by_field_name("function")?;
    if callee.kind() != "identifier" || txt(callee, src) != "require" {
        return None;
    }
    let args = node.child_by_field_name("arguments")?;
    let first = args.named_child(0)?;
    string_literal(first, src)
}

/// Local names bound by a destructuring pattern: `{ a, b: c, d = 1 }` -> `a, c, d`.
pub(super) fn destructured_bindings(pattern: Node, src: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = pattern.walk();
    for child in pattern.named_children(&mut cursor) {
        let local = match child.kind() {
            "shorthand_property_identifier_pattern" => Some(child),
            "pair_pattern" => child
                .child_by_field_name("value")
                .map(|v| {
                    if v.kind() == "assignment_pattern" {
                        v.child_by_field_name("left").unwrap_or(v)
                    } else {
                        v
                    }
                })
                .filter(|v| v.kind() == "identifier"),
            "object_assignment_pattern" => child.child_by_field_name("left"),
            _ => None,
        };
        if let Some(local) = local {
            names.push(txt(local, src).to_string());
        }
    }
    names
}

fn first_named_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|c| c.kind() == kind);
    found
}
