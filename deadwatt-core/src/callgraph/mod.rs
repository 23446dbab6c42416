//! Call-graph construction and reachability analysis.
//!
//! Split into focused submodules:
//! - [`extractor`]: walks parse trees for call expressions and textual
//!   name references, attributing each to its enclosing function
//! - [`graph`]: builds the directed call graph, seeds entry points, and
//!   computes reachability with a cycle-tolerant multi-source BFS

pub mod extractor;
pub mod graph;

pub use extractor::{extract_usage, CallTarget, NameReference, RawCall, UsageExtraction};
pub use graph::{CallEdge, CallGraph, CallGraphStats, Resolution};
