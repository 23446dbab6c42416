//! Configuration loading from deadwatt.toml and calibration constants.
//!
//! All calibration constants live in an immutable [`CalibrationConfig`]
//! passed by reference into the estimator and classifier. Runs with equal
//! source text and equal constants produce identical results.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

/// How the per-file `total_energy` aggregate is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalEnergyMode {
    /// Sum `energy_impact` over dead-code-flagged functions only: the
    /// energy recoverable by deletion.
    #[default]
    UnusedOnly,
    /// Sum over every function in the file.
    AllFunctions,
}

/// Calibration constants for the cost/energy estimator and the
/// entry-point amnesty rule.
///
/// Deserializable so projects can override individual fields in
/// `deadwatt.toml`; every field has a calibrated default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Joules attributed to one estimated floating-point operation.
    pub energy_per_flop: f64,
    /// Joules attributed per body line (baseline footprint of code size).
    pub energy_per_line: f64,
    /// Assumed iteration count for a loop whose trip count is not
    /// statically known. Applied multiplicatively per nesting level.
    pub loop_iteration_weight: f64,
    /// Nesting depth beyond which the loop multiplier stops growing.
    /// Keeps pathological nesting from overflowing the flop count.
    pub max_loop_depth: u32,
    /// Weight of one arithmetic/tensor-like operator.
    pub weight_arithmetic: u64,
    /// Weight of one comparison or boolean operator.
    pub weight_comparison: u64,
    /// Fixed overhead charged per call expression.
    pub weight_call: u64,
    /// Decorator name segments that mark a function as externally invoked
    /// (route/handler/test registration and similar framework triggers).
    /// Matching any segment grants amnesty from dead-code flagging.
    pub amnesty_decorators: Vec<String>,
    /// Aggregate energy reporting mode.
    pub total_energy_mode: TotalEnergyMode,
    /// `estimated_flops` above which a function is offered to the
    /// annotation provider for rewriting.
    pub rewrite_flops_threshold: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            energy_per_flop: 0.1,
            energy_per_line: 0.2,
            loop_iteration_weight: 10.0,
            max_loop_depth: 6,
            weight_arithmetic: 1,
            weight_comparison: 1,
            weight_call: 5,
            amnesty_decorators: default_amnesty_decorators(),
            total_energy_mode: TotalEnergyMode::UnusedOnly,
            rewrite_flops_threshold: 50,
        }
    }
}

impl CalibrationConfig {
    /// Check whether a decorator segment list grants external-invocation
    /// amnesty. Segments are the dotted parts of the decorator expression
    /// with any call arguments stripped (`@app.route("/x")` → `app`, `route`).
    pub fn is_amnesty_decorator(&self, segments: &[String]) -> bool {
        segments
            .iter()
            .any(|s| self.amnesty_decorators.iter().any(|a| a == s))
    }
}

/// Decorator segments conventionally associated with external triggering.
///
/// The list trades false negatives (keeping some genuinely dead code) for
/// never flagging code a framework invokes implicitly.
fn default_amnesty_decorators() -> Vec<String> {
    [
        // HTTP route registration
        "route", "get", "post", "put", "delete", "patch", "websocket",
        // event/handler registration
        "handler", "listener", "on_event", "subscribe", "middleware",
        // background/scheduled work
        "task", "job", "periodic_task", "scheduled",
        // test registration
        "fixture", "parametrize", "pytest",
        // CLI entry points
        "command", "cli", "main",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Main configuration structure for deadwatt.toml.
#[derive(Debug, Deserialize, Default)]
pub struct DeadwattConfig {
    /// Function names or patterns to ignore in reports.
    pub ignore: Option<Vec<String>>,
    /// Calibration overrides.
    pub calibration: Option<CalibrationConfig>,
    /// Output configuration.
    pub output: Option<OutputConfig>,
}

/// Output format configuration.
#[derive(Debug, Deserialize, Default)]
pub struct OutputConfig {
    /// Output format: "text" or "json".
    pub format: Option<String>,
}

/// Loads configuration from deadwatt.toml if it exists.
pub fn load_config(root: &Path) -> Result<Option<DeadwattConfig>> {
    let path = root.join("deadwatt.toml");
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)?;
    let cfg = toml::from_str(&content).context("Invalid deadwatt.toml")?;
    Ok(Some(cfg))
}
