//! Prelude module for convenient imports.
//!
//! Import commonly used types with a single line:
//!
//! ```rust,ignore
//! use deadwatt_core::prelude::*;
//! ```
//!
//! This provides the most commonly needed types for dead code analysis
//! without polluting the namespace with rarely-used items.

// Core analysis types
pub use crate::error::{DeadwattError, DeadwattResult};
pub use crate::parse::{FunctionDecl, ScopeKind, SourceUnit};

// Graph building and traversal
pub use crate::callgraph::{CallGraph, Resolution};

// Dead code detection
pub use crate::classify::find_dead;

// Estimation
pub use crate::estimate::{estimate_function, CostEstimate};

// File scanning
pub use crate::scan::{gather_py_files, gather_py_files_with_excludes};

// Configuration
pub use crate::config::{load_config, CalibrationConfig, TotalEnergyMode};

// Builder API
pub use crate::builder::{BatchResult, Deadwatt};

// Results
pub use crate::report::{AnalysisResult, FunctionRecord};

// Removal
#[cfg(feature = "removal")]
pub use crate::removal::{remove_unused, RemovalOutcome};

// Annotation
#[cfg(feature = "annotate")]
pub use crate::annotate::{AnnotateOptions, Annotation, AnnotationProvider};
