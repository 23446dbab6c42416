//! Source parsing and function-model extraction.
//!
//! Turns raw Python source text into a [`SourceUnit`] (file identity, raw
//! text, parsed-tree handle) plus an ordered list of [`FunctionDecl`]s with
//! nesting context, decorator tokens, and exact byte offsets.
//!
//! Byte offsets are preserved untouched so the removal generator can splice
//! text without re-serializing unrelated code.

use std::path::{Path, PathBuf};

use tree_sitter::{Node, Parser, Tree};

use crate::error::{DeadwattError, DeadwattResult};

/// Attribute-call names that indicate thread management in a body.
const THREAD_CALL_NAMES: &[&str] = &["start", "join", "run"];

/// A parsed source file. Owned exclusively by one analysis run and
/// immutable after parse.
#[derive(Debug)]
pub struct SourceUnit {
    /// Numeric file identity within the batch (1-based).
    pub file_id: u32,
    /// Path the source was read from.
    pub path: PathBuf,
    /// Raw source text.
    pub source: String,
    /// Opaque parsed-tree handle.
    tree: Tree,
}

impl SourceUnit {
    /// Root node of the parse tree.
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// The innermost named node covering the given byte range.
    pub fn node_at(&self, start: usize, end: usize) -> Option<Node<'_>> {
        self.tree.root_node().named_descendant_for_byte_range(start, end)
    }
}

/// Enclosing scope of a function declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    /// Free function at module level.
    Module,
    /// Method inside a class body (class name).
    Class(String),
    /// Function nested inside another function (enclosing function name).
    Function(String),
}

/// A decorator attached to a function, with the `@` stripped.
#[derive(Debug, Clone)]
pub struct Decorator {
    /// Full decorator expression text (e.g. `app.route("/users")`).
    pub text: String,
    /// Dotted name segments with call arguments stripped
    /// (e.g. `["app", "route"]`).
    pub segments: Vec<String>,
}

/// A single function declaration in source order.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    /// Stable id, equal to the declaration index within the unit.
    pub id: u32,
    /// Simple name (e.g. `helper`).
    pub name: String,
    /// Dotted name unique within its enclosing scope
    /// (e.g. `Worker.helper`, `outer.inner`).
    pub qualified_name: String,
    /// Enclosing scope.
    pub scope: ScopeKind,
    /// Decorators in source order.
    pub decorators: Vec<Decorator>,
    /// `async def`.
    pub is_async: bool,
    /// Body manages threads (`threading.Thread`, `.start()`, `.join()`).
    pub is_threaded: bool,
    /// Start byte of the declaration, including decorators.
    pub start_byte: usize,
    /// End byte of the declaration (exclusive).
    pub end_byte: usize,
    /// 1-based first line, including decorators.
    pub start_line: usize,
    /// 1-based last line.
    pub end_line: usize,
    /// Byte range of the body block, for cost estimation.
    pub body_start_byte: usize,
    /// End byte of the body block (exclusive).
    pub body_end_byte: usize,
    /// Line span of the body block (first through last body line).
    pub body_line_count: usize,
}

impl FunctionDecl {
    /// Whether the declaration's simple name is dunder-styled
    /// (`__init__`, `__call__`, ...). Dunder methods are invoked by the
    /// runtime, never through an in-source call edge.
    pub fn is_dunder(&self) -> bool {
        self.name.len() > 4 && self.name.starts_with("__") && self.name.ends_with("__")
    }

    /// Whether `byte` falls inside this declaration's source range.
    pub fn contains_byte(&self, byte: usize) -> bool {
        byte >= self.start_byte && byte < self.end_byte
    }
}

/// Build a parser for the Python grammar.
fn python_parser() -> DeadwattResult<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| DeadwattError::Internal {
            message: format!("Failed to load Python grammar: {e}"),
        })?;
    Ok(parser)
}

/// Parse source text into a [`SourceUnit`].
///
/// Fails with a located `Parse` error when the text does not parse; the
/// caller is expected to continue with sibling files in a batch.
pub fn parse_source(
    file_id: u32,
    path: impl Into<PathBuf>,
    source: impl Into<String>,
) -> DeadwattResult<SourceUnit> {
    let path = path.into();
    let source = source.into();

    let mut parser = python_parser()?;
    let tree = parser
        .parse(&source, None)
        .ok_or_else(|| DeadwattError::parse(&path, "parser returned no tree"))?;

    if tree.root_node().has_error() {
        if let Some(bad) = first_error_node(tree.root_node()) {
            let pos = bad.start_position();
            return Err(DeadwattError::parse_at(
                &path,
                format!("invalid syntax near `{}`", snippet(&source, &bad)),
                pos.row + 1,
                pos.column + 1,
            ));
        }
        return Err(DeadwattError::parse(&path, "invalid syntax"));
    }

    Ok(SourceUnit {
        file_id,
        path,
        source,
        tree,
    })
}

/// Read and parse a file from disk.
pub fn parse_file(file_id: u32, path: &Path) -> DeadwattResult<SourceUnit> {
    let source =
        std::fs::read_to_string(path).map_err(|e| DeadwattError::io(path.to_path_buf(), e))?;
    parse_source(file_id, path.to_path_buf(), source)
}

/// Validate that `source` parses cleanly, without building a unit.
///
/// Used by the removal generator to confirm cleaned output is still valid.
pub fn reparses_cleanly(source: &str) -> bool {
    match python_parser() {
        Ok(mut parser) => parser
            .parse(source, None)
            .is_some_and(|t| !t.root_node().has_error()),
        Err(_) => false,
    }
}

/// Depth-first search for the first ERROR or MISSING node.
fn first_error_node(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error_node(child) {
            return Some(found);
        }
    }
    None
}

/// Short excerpt of a node's text for error messages.
fn snippet<'a>(source: &'a str, node: &Node<'_>) -> &'a str {
    let text = &source[node.byte_range()];
    let end = text
        .char_indices()
        .take(24)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    &text[..end]
}

/// Extract all function declarations from a unit in declaration order.
///
/// Covers free functions, methods, and nested functions; each record
/// carries its decorators and exact byte offsets (decorators included).
pub fn extract_functions(unit: &SourceUnit) -> Vec<FunctionDecl> {
    let mut decls = Vec::with_capacity(16);
    let mut scope: Vec<(String, bool)> = Vec::new(); // (name, is_class)
    visit(unit.root(), unit.source.as_bytes(), &mut scope, &mut decls);

    // Declaration order, then stable ids
    decls.sort_by_key(|d: &FunctionDecl| d.start_byte);
    for (i, d) in decls.iter_mut().enumerate() {
        d.id = i as u32;
    }
    decls
}

fn visit(
    node: Node<'_>,
    source: &[u8],
    scope: &mut Vec<(String, bool)>,
    out: &mut Vec<FunctionDecl>,
) {
    match node.kind() {
        "decorated_definition" => {
            let decorators = extract_decorators(node, source);
            if let Some(def) = node.child_by_field_name("definition") {
                match def.kind() {
                    "function_definition" => {
                        record_function(node, def, decorators, source, scope, out)
                    }
                    "class_definition" => visit_class(def, source, scope, out),
                    _ => {}
                }
            }
        }
        "function_definition" => record_function(node, node, Vec::new(), source, scope, out),
        "class_definition" => visit_class(node, source, scope, out),
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                visit(child, source, scope, out);
            }
        }
    }
}

fn visit_class(
    class: Node<'_>,
    source: &[u8],
    scope: &mut Vec<(String, bool)>,
    out: &mut Vec<FunctionDecl>,
) {
    let name = node_text(class.child_by_field_name("name"), source);
    scope.push((name, true));
    if let Some(body) = class.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            visit(child, source, scope, out);
        }
    }
    scope.pop();
}

/// Record one function declaration, then descend into its body for
/// nested definitions.
///
/// `outer` is the range-defining node (the `decorated_definition` wrapper
/// when decorators are present, the `function_definition` itself otherwise).
fn record_function(
    outer: Node<'_>,
    def: Node<'_>,
    decorators: Vec<Decorator>,
    source: &[u8],
    scope: &mut Vec<(String, bool)>,
    out: &mut Vec<FunctionDecl>,
) {
    let name = node_text(def.child_by_field_name("name"), source);
    if name.is_empty() {
        return;
    }

    let kind = match scope.last() {
        Some((enclosing, true)) => ScopeKind::Class(enclosing.clone()),
        Some((enclosing, false)) => ScopeKind::Function(enclosing.clone()),
        None => ScopeKind::Module,
    };

    let qualified_name = if scope.is_empty() {
        name.clone()
    } else {
        let mut parts: Vec<&str> = scope.iter().map(|(n, _)| n.as_str()).collect();
        parts.push(&name);
        parts.join(".")
    };

    let body = def.child_by_field_name("body");
    let (body_start, body_end, body_lines) = match body {
        Some(b) => (
            b.start_byte(),
            b.end_byte(),
            b.end_position().row - b.start_position().row + 1,
        ),
        None => (def.end_byte(), def.end_byte(), 0),
    };

    let mut cursor = def.walk();
    let is_async = def.children(&mut cursor).any(|c| c.kind() == "async");
    drop(cursor);

    let is_threaded = body.is_some_and(|b| body_uses_threads(b, source));

    out.push(FunctionDecl {
        id: 0, // assigned after sorting
        name: name.clone(),
        qualified_name,
        scope: kind,
        decorators,
        is_async,
        is_threaded,
        start_byte: outer.start_byte(),
        end_byte: outer.end_byte(),
        start_line: outer.start_position().row + 1,
        end_line: outer.end_position().row + 1,
        body_start_byte: body_start,
        body_end_byte: body_end,
        body_line_count: body_lines,
    });

    // Nested definitions live in their own records
    if let Some(b) = body {
        scope.push((name, false));
        let mut cursor = b.walk();
        for child in b.named_children(&mut cursor) {
            visit(child, source, scope, out);
        }
        scope.pop();
    }
}

fn extract_decorators(decorated: Node<'_>, source: &[u8]) -> Vec<Decorator> {
    let mut decorators = Vec::new();
    let mut cursor = decorated.walk();
    for child in decorated.named_children(&mut cursor) {
        if child.kind() != "decorator" {
            continue;
        }
        // The decorator's single named child is the expression after `@`
        let Some(expr) = child.named_child(0) else {
            continue;
        };
        let mut segments = Vec::new();
        collect_name_segments(expr, source, &mut segments);
        decorators.push(Decorator {
            text: node_text(Some(expr), source),
            segments,
        });
    }
    decorators
}

/// Flatten a decorator expression into dotted name segments, stripping
/// call arguments: `app.route("/x")` → `["app", "route"]`.
fn collect_name_segments(node: Node<'_>, source: &[u8], out: &mut Vec<String>) {
    match node.kind() {
        "identifier" => out.push(node_text(Some(node), source)),
        "attribute" => {
            if let Some(obj) = node.child_by_field_name("object") {
                collect_name_segments(obj, source, out);
            }
            if let Some(attr) = node.child_by_field_name("attribute") {
                out.push(node_text(Some(attr), source));
            }
        }
        "call" => {
            if let Some(func) = node.child_by_field_name("function") {
                collect_name_segments(func, source, out);
            }
        }
        _ => {}
    }
}

/// Detect thread management inside a body: `threading.Thread(...)`
/// construction or `.start()` / `.join()` / `.run()` attribute calls.
fn body_uses_threads(body: Node<'_>, source: &[u8]) -> bool {
    if body.kind() == "call" {
        if let Some(func) = body.child_by_field_name("function") {
            if func.kind() == "attribute" {
                let attr = node_text(func.child_by_field_name("attribute"), source);
                if THREAD_CALL_NAMES.contains(&attr.as_str()) {
                    return true;
                }
                let obj = node_text(func.child_by_field_name("object"), source);
                if obj == "threading" {
                    return true;
                }
            }
        }
    }
    let mut cursor = body.walk();
    let children: Vec<Node<'_>> = body.named_children(&mut cursor).collect();
    children
        .into_iter()
        .any(|child| body_uses_threads(child, source))
}

fn node_text(node: Option<Node<'_>>, source: &[u8]) -> String {
    node.and_then(|n| n.utf8_text(source).ok())
        .unwrap_or_default()
        .to_string()
}
