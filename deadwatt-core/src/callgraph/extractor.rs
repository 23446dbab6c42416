//! Call-expression and name-reference extraction from parse trees.
//!
//! Detects:
//! - Direct calls through a literal name: `helper()`
//! - Attribute-chain calls: `obj.method()`, `module.func()`
//! - Computed/dynamic calls: `table["key"]()`, `getattr(m, "f")()`
//! - Higher-order references: a function name mentioned without a call
//!
//! Direct calls become candidate resolved edges. Everything else is kept
//! as a dynamic target plus textual references, feeding the
//! conservative-liveness rule: a name referenced outside its own
//! definition is never flagged dead.

use std::sync::OnceLock;

use regex::Regex;
use tree_sitter::Node;

use crate::parse::{FunctionDecl, SourceUnit};

/// Identifier-shaped words inside string literals; backs reference
/// detection for `getattr`-style dispatch tables.
fn word_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("hardcoded pattern is valid"))
}

/// Target of one call expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    /// Call through a literal, statically-known name.
    Name(String),
    /// Attribute-chain or computed target; the trailing attribute name is
    /// kept when one exists (`obj.method()` → `Some("method")`).
    Dynamic(Option<String>),
}

/// One call expression, attributed to its enclosing function.
#[derive(Debug, Clone)]
pub struct RawCall {
    /// Id of the enclosing function declaration; `None` for module-level
    /// code, including the `__main__` guard body.
    pub caller: Option<u32>,
    /// What is being called.
    pub target: CallTarget,
    /// Byte offset of the call expression.
    pub byte: usize,
}

/// A textual reference to a name, outside direct-call position.
#[derive(Debug, Clone)]
pub struct NameReference {
    pub name: String,
    pub byte: usize,
}

/// Everything the graph builder needs from one source unit.
#[derive(Debug, Default)]
pub struct UsageExtraction {
    pub calls: Vec<RawCall>,
    pub references: Vec<NameReference>,
}

/// Walk the unit's tree for call expressions and name references.
///
/// `decls` must be the unit's extracted declarations; call sites are
/// attributed to the innermost declaration whose byte range contains them.
pub fn extract_usage(unit: &SourceUnit, decls: &[FunctionDecl]) -> UsageExtraction {
    let mut usage = UsageExtraction::default();
    walk(unit.root(), unit.source.as_bytes(), decls, false, &mut usage);
    usage
}

/// Innermost enclosing declaration for a byte offset.
fn enclosing_function(decls: &[FunctionDecl], byte: usize) -> Option<u32> {
    decls
        .iter()
        .filter(|d| d.contains_byte(byte))
        .max_by_key(|d| d.start_byte)
        .map(|d| d.id)
}

fn walk(
    node: Node<'_>,
    source: &[u8],
    decls: &[FunctionDecl],
    in_decorator: bool,
    out: &mut UsageExtraction,
) {
    match node.kind() {
        "decorator" => {
            // Decorator expressions run at module import time, so their
            // calls belong to module-level code, not the decorated body.
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
            for child in children {
                walk(child, source, decls, true, out);
            }
        }
        "call" => {
            let byte = node.start_byte();
            let caller = if in_decorator {
                None
            } else {
                enclosing_function(decls, byte)
            };
            match node.child_by_field_name("function") {
                Some(func) if func.kind() == "identifier" => {
                    // Literal-name call. The name is consumed here as a call
                    // target, not a reference, so it does not feed the
                    // conservative rule.
                    out.calls.push(RawCall {
                        caller,
                        target: CallTarget::Name(text(func, source)),
                        byte,
                    });
                }
                Some(func) if func.kind() == "attribute" => {
                    let attr = func
                        .child_by_field_name("attribute")
                        .map(|a| text(a, source));
                    out.calls.push(RawCall {
                        caller,
                        target: CallTarget::Dynamic(attr),
                        byte,
                    });
                    // The object side may mention functions by name
                    if let Some(obj) = func.child_by_field_name("object") {
                        walk(obj, source, decls, in_decorator, out);
                    }
                }
                Some(func) => {
                    // Computed target: subscript, lambda, nested call, ...
                    out.calls.push(RawCall {
                        caller,
                        target: CallTarget::Dynamic(None),
                        byte,
                    });
                    walk(func, source, decls, in_decorator, out);
                }
                None => {}
            }
            if let Some(args) = node.child_by_field_name("arguments") {
                walk(args, source, decls, in_decorator, out);
            }
        }
        "identifier" => {
            out.references.push(NameReference {
                name: text(node, source),
                byte: node.start_byte(),
            });
        }
        "string" => {
            // Word-scan string contents: dispatch tables and getattr()
            // reference functions by quoted name.
            let base = node.start_byte();
            if let Ok(content) = node.utf8_text(source) {
                for m in word_regex().find_iter(content) {
                    out.references.push(NameReference {
                        name: m.as_str().to_string(),
                        byte: base + m.start(),
                    });
                }
            }
        }
        "function_definition" => {
            // Skip the name token (a definition is not a use of itself);
            // parameter defaults and the body are real reference sites.
            if let Some(params) = node.child_by_field_name("parameters") {
                walk(params, source, decls, false, out);
            }
            if let Some(body) = node.child_by_field_name("body") {
                walk(body, source, decls, false, out);
            }
        }
        "class_definition" => {
            if let Some(supers) = node.child_by_field_name("superclasses") {
                walk(supers, source, decls, in_decorator, out);
            }
            if let Some(body) = node.child_by_field_name("body") {
                walk(body, source, decls, false, out);
            }
        }
        _ => {
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
            for child in children {
                walk(child, source, decls, in_decorator, out);
            }
        }
    }
}

fn text(node: Node<'_>, source: &[u8]) -> String {
    node.utf8_text(source).unwrap_or_default().to_string()
}
