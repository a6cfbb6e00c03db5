use tree_sitter::Node;

use super::imports::require_specifier;
use crate::model::ImportDescriptor;
use crate::util::txt;

/// Identifiers referenced by route arguments, plus synthetic bindings for
/// inline `require()` calls.
#[derive(Debug, Default)]
pub(super) struct TargetScan {
    pub identifiers: Vec<String>,
    pub inline_requires: Vec<ImportDescriptor>,
}

impl TargetScan {
    pub(super) fn scan(mut self, args: &[Node], src: &[u8]) -> Self {
        for arg in args {
            self.visit(*arg, src);
        }
        self
    }

    fn push(&mut self, name: String) {
        if !self.identifiers.contains(&name) {
            self.identifiers.push(name);
        }
    }

    fn visit(&mut self, node: Node, src: &[u8]) {
        match node.kind() {
            "identifier" => self.push(txt(node, src).to_string()),
            "member_expression" | "subscript_expression" => {
                if let Some(object) = node.child_by_field_name("object") {
                    self.visit(object, src);
                }
            }
            "call_expression" => {
                if let Some(specifier) = require_specifier(node, src) {
                    let descriptor = ImportDescriptor::inline_require(&specifier);
                    self.push(descriptor.local.clone());
                    self.inline_requires.push(descriptor);
                    return;
                }
                if let Some(callee) = node.child_by_field_name("function") {
                    self.visit(callee, src);
                }
                if let Some(args) = node.child_by_field_name("arguments") {
                    self.visit(args, src);
                }
            }
            "arguments"
            | "array"
            | "parenthesized_expression"
            | "as_expression"
            | "satisfies_expression"
            | "non_null_expression"
            | "await_expression"
            | "spread_element" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.visit(child, src);
                }
            }
            // Inline handlers and literals reference nothing importable.
            _ => {}
        }
    }
}
