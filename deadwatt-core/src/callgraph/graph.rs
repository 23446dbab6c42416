//! Directed call-graph construction and reachability.
//!
//! Performance characteristics:
//! - Graph build: O(|F| + |C|) where F = functions, C = call sites
//! - Reachability: O(|F| + |E|) single multi-source BFS
//!
//! The graph is a general directed graph: recursive and mutually-calling
//! clusters are ordinary cycles, handled by the visited-set guard. Liveness
//! is defined by reachability from entry points, never by mere
//! inter-connectivity.
//!
//! Entry points are marked reachable directly rather than through an edge:
//! - targets of module-level calls (including the `__main__` guard body)
//! - functions carrying an amnesty decorator (route/handler/test markers)
//! - dunder-named methods (invoked by the runtime)
//! - names referenced textually outside their own definition (conservative
//!   stand-in for dynamic dispatch)

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::graphmap::DiGraphMap;

use crate::callgraph::extractor::{CallTarget, UsageExtraction};
use crate::config::CalibrationConfig;
use crate::parse::{FunctionDecl, ScopeKind};

/// Confidence of a call edge's target resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Target resolved to a declaration through a literal name.
    Resolved,
    /// Dynamic, computed, or otherwise statically undeterminable target.
    Unresolved,
}

/// One directed edge, caller → callee.
#[derive(Debug, Clone)]
pub struct CallEdge {
    /// Calling function id; `None` for module-level code.
    pub caller: Option<u32>,
    /// Callee id when resolution succeeded.
    pub callee: Option<u32>,
    pub resolution: Resolution,
    /// Textual target name, when one exists.
    pub target: String,
}

/// Summary counters for one unit's call graph.
#[derive(Debug, Clone, Default)]
pub struct CallGraphStats {
    pub total_functions: usize,
    pub entry_points: usize,
    pub resolved_edges: usize,
    pub unresolved_edges: usize,
}

/// Call graph over one source unit's function declarations.
///
/// Nodes are in 1:1 correspondence with the unit's declarations; resolved
/// edges live in a `DiGraphMap` for traversal while the full edge record
/// (unresolved included) is kept alongside.
pub struct CallGraph {
    resolved: DiGraphMap<u32, ()>,
    edges: Vec<CallEdge>,
    entry_points: BTreeSet<u32>,
    node_count: usize,
}

impl CallGraph {
    /// Build the graph from extracted declarations and usage.
    pub fn build(
        decls: &[FunctionDecl],
        usage: &UsageExtraction,
        config: &CalibrationConfig,
    ) -> Self {
        let mut resolved = DiGraphMap::new();
        for decl in decls {
            resolved.add_node(decl.id);
        }

        // Simple name -> declaration ids
        let mut by_name: HashMap<&str, Vec<u32>> = HashMap::new();
        for decl in decls {
            by_name.entry(decl.name.as_str()).or_default().push(decl.id);
        }

        let mut edges = Vec::with_capacity(usage.calls.len());
        let mut entry_points = BTreeSet::new();

        // 1. Declaration markers: amnesty decorators and dunder methods
        for decl in decls {
            let amnesty = decl
                .decorators
                .iter()
                .any(|d| config.is_amnesty_decorator(&d.segments));
            if amnesty || decl.is_dunder() {
                entry_points.insert(decl.id);
            }
        }

        // 2. Call expressions
        for call in &usage.calls {
            match &call.target {
                CallTarget::Name(name) => {
                    let candidates = bare_name_candidates(decls, name, call.byte);
                    if candidates.is_empty() {
                        // Unknown literal target (builtin, import, or a
                        // method name used bare): record unresolved and
                        // conservatively keep any same-named declaration.
                        edges.push(CallEdge {
                            caller: call.caller,
                            callee: None,
                            resolution: Resolution::Unresolved,
                            target: name.clone(),
                        });
                        if let Some(ids) = by_name.get(name.as_str()) {
                            entry_points.extend(ids.iter().copied());
                        }
                    } else {
                        for callee in candidates {
                            if call.caller != Some(callee) {
                                edges.push(CallEdge {
                                    caller: call.caller,
                                    callee: Some(callee),
                                    resolution: Resolution::Resolved,
                                    target: name.clone(),
                                });
                                match call.caller {
                                    Some(caller) => {
                                        resolved.add_edge(caller, callee, ());
                                    }
                                    // Module top-level code is itself an
                                    // entry point; its targets seed the set.
                                    None => {
                                        entry_points.insert(callee);
                                    }
                                }
                            }
                        }
                    }
                }
                CallTarget::Dynamic(attr) => {
                    edges.push(CallEdge {
                        caller: call.caller,
                        callee: None,
                        resolution: Resolution::Unresolved,
                        target: attr.clone().unwrap_or_default(),
                    });
                    if let Some(name) = attr {
                        if let Some(ids) = by_name.get(name.as_str()) {
                            entry_points.extend(ids.iter().copied());
                        }
                    }
                }
            }
        }

        // 3. Textual references outside a declaration's own range
        for reference in &usage.references {
            if let Some(ids) = by_name.get(reference.name.as_str()) {
                for &id in ids {
                    let decl = &decls[id as usize];
                    if !decl.contains_byte(reference.byte) {
                        entry_points.insert(id);
                    }
                }
            }
        }

        Self {
            resolved,
            edges,
            entry_points,
            node_count: decls.len(),
        }
    }

    /// All edges, unresolved included, in extraction order.
    pub fn edges(&self) -> &[CallEdge] {
        &self.edges
    }

    /// Directly-marked entry points.
    pub fn entry_points(&self) -> impl Iterator<Item = u32> + '_ {
        self.entry_points.iter().copied()
    }

    /// Compute all function ids reachable from the entry set.
    ///
    /// Multi-source BFS over resolved edges; the visited set guards
    /// against cycles, so recursive clusters terminate.
    pub fn compute_reachable(&self) -> HashSet<u32> {
        let mut visited: HashSet<u32> = HashSet::with_capacity(self.node_count);
        let mut queue: VecDeque<u32> = VecDeque::new();

        for &root in &self.entry_points {
            if visited.insert(root) {
                queue.push_back(root);
            }
        }

        while let Some(node) = queue.pop_front() {
            for callee in self.resolved.neighbors(node) {
                if visited.insert(callee) {
                    queue.push_back(callee);
                }
            }
        }

        visited
    }

    /// Summary counters.
    pub fn stats(&self) -> CallGraphStats {
        let resolved_edges = self
            .edges
            .iter()
            .filter(|e| e.resolution == Resolution::Resolved)
            .count();
        CallGraphStats {
            total_functions: self.node_count,
            entry_points: self.entry_points.len(),
            resolved_edges,
            unresolved_edges: self.edges.len() - resolved_edges,
        }
    }
}

/// Declarations a bare-name call can legally resolve to.
///
/// Module-level functions are visible everywhere in the file. A nested
/// function is visible only where its enclosing function's range covers
/// the call site. Methods are never bare-name targets; they stay on the
/// unresolved path.
fn bare_name_candidates(decls: &[FunctionDecl], name: &str, call_byte: usize) -> Vec<u32> {
    decls
        .iter()
        .filter(|d| d.name == name)
        .filter(|d| match &d.scope {
            ScopeKind::Module => true,
            ScopeKind::Function(_) => decls
                .iter()
                .any(|p| p.contains_byte(d.start_byte) && p.contains_byte(call_byte)),
            ScopeKind::Class(_) => false,
        })
        .map(|d| d.id)
        .collect()
}
