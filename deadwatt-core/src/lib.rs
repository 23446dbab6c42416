//! deadwatt-core: dead-code and energy-impact analysis for Python sources.
//!
//! This library provides modular components for parsing Python codebases,
//! building call graphs, classifying dead (unreachable) functions,
//! estimating their computational cost, and converting that cost into an
//! energy figure so unused work can be deleted with quantified savings.
//!
//! # Features
//!
//! - **Function-level model**: free functions, methods, nested functions,
//!   decorators, async/threading markers, exact byte offsets
//! - **Call graph analysis**: resolved vs. unresolved edges with a
//!   conservative-liveness rule for dynamic targets
//! - **Reachability classification**: multi-source BFS from module-level
//!   code, amnesty decorators, and dunder methods
//! - **Cost & energy estimation**: calibrated static heuristics, never
//!   executing the analyzed code
//! - **Safe removal**: validated excision of dead functions plus a
//!   unified diff
//! - **Fail-soft AI annotation**: optional, bounded, cancellable
//!
//! # Quick Start
//!
//! Use the [`prelude`] module for convenient imports:
//!
//! ```rust,ignore
//! use deadwatt_core::prelude::*;
//!
//! let batch = Deadwatt::new("/path/to/project")
//!     .include_diff(true)
//!     .analyze()?;
//!
//! for result in batch.results() {
//!     for dead in result.unused() {
//!         println!("{}: {:.2} J", dead.qualified_name, dead.energy_impact);
//!     }
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`parse`]: source parsing and function-model extraction
//! - [`callgraph`]: call-expression extraction and graph reachability
//! - [`classify`]: dead-function classification
//! - [`estimate`]: static cost and energy estimation
//! - [`report`]: result assembly, JSON and marker-text rendering
//! - [`scan`]: parallel file discovery
//! - [`builder`]: fluent configuration API
//! - [`config`]: calibration constants and deadwatt.toml loading
//! - [`error`]: typed error handling
//!
//! # Cargo Features
//!
//! - `removal` (default): safe-removal diff generation
//! - `html` (default): HTML report output
//! - `annotate` (default): async AI annotation pass
//! - `full`: all optional features

// Core modules (always available)
pub mod builder;
pub mod callgraph;
pub mod classify;
pub mod config;
pub mod error;
pub mod estimate;
pub mod logging;
pub mod parse;
pub mod prelude;
pub mod report;
pub mod scan;

// Feature-gated modules
#[cfg(feature = "removal")]
pub mod removal;

#[cfg(feature = "html")]
pub mod report_html;

#[cfg(feature = "annotate")]
pub mod annotate;

// ============================================================================
// Explicit Re-exports (avoiding glob imports for clear API surface)
// ============================================================================

// Error types
pub use error::{DeadwattError, DeadwattResult, IoResultExt};

// Builder API
pub use builder::{BatchResult, Deadwatt, FileOutcome};

// Configuration
pub use config::{load_config, CalibrationConfig, DeadwattConfig, OutputConfig, TotalEnergyMode};

// Parsing
pub use parse::{
    extract_functions, parse_file, parse_source, reparses_cleanly, Decorator, FunctionDecl,
    ScopeKind, SourceUnit,
};

// Call graph
pub use callgraph::{
    extract_usage, CallEdge, CallGraph, CallGraphStats, CallTarget, NameReference, RawCall,
    Resolution, UsageExtraction,
};

// Classification
pub use classify::find_dead;

// Estimation
pub use estimate::{energy_impact, estimate_function, CostEstimate};

// Reporting
pub use report::{
    assemble, print_json, print_text, render_json, render_text, AnalysisResult, FunctionRecord,
    RewrittenFunction,
};

// Logging
pub use logging::{init_structured_logging, log_error, log_info, log_warn};

// File scanning
pub use scan::{gather_py_files, gather_py_files_with_excludes};

// Feature-gated re-exports
#[cfg(feature = "removal")]
pub use removal::{remove_unused, write_cleaned, RemovalOutcome};

#[cfg(feature = "html")]
pub use report_html::generate_html_report;

#[cfg(feature = "annotate")]
pub use annotate::{
    annotate_result, cancellation, AnnotateOptions, Annotation, AnnotationProvider,
};
