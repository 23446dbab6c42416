//! Static cost and energy estimation.
//!
//! Scores each function's computational weight from its parse tree alone:
//! a weighted count of arithmetic/comparison operations and call overhead,
//! with loop bodies multiplied by a calibrated iteration factor per
//! nesting level (unknown trip counts use the calibrated constant, never
//! zero). The score converts to an energy figure through two calibration
//! constants.
//!
//! This is an approximation, not a measurement: the analyzed code is
//! never executed, and identical inputs always produce identical figures.

use tree_sitter::Node;

use crate::config::CalibrationConfig;
use crate::parse::{FunctionDecl, SourceUnit};

/// Node kinds that repeat their body a statically-unknown number of times.
const LOOP_KINDS: &[&str] = &[
    "for_statement",
    "while_statement",
    "list_comprehension",
    "set_comprehension",
    "dictionary_comprehension",
    "generator_expression",
];

/// Node kinds counted as arithmetic/tensor-like work.
const ARITHMETIC_KINDS: &[&str] = &["binary_operator", "unary_operator", "augmented_assignment"];

/// Node kinds counted as comparisons/branch predicates.
const COMPARISON_KINDS: &[&str] = &["comparison_operator", "boolean_operator", "not_operator"];

/// Estimated cost of one function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEstimate {
    /// Weighted operation count.
    pub flops: u64,
    /// Calibrated energy figure in joules. Non-negative.
    pub energy_joules: f64,
}

/// Estimate the cost of a single declaration's body.
///
/// Computed for every function, dead or live; the figure is informative
/// for both.
pub fn estimate_function(
    unit: &SourceUnit,
    decl: &FunctionDecl,
    config: &CalibrationConfig,
) -> CostEstimate {
    let mut weighted = 0.0_f64;
    if decl.body_end_byte > decl.body_start_byte {
        if let Some(body) = unit.node_at(decl.body_start_byte, decl.body_end_byte) {
            count_ops(body, 0, config, &mut weighted);
        }
    }

    let flops = weighted.round().min(u64::MAX as f64).max(0.0) as u64;
    CostEstimate {
        flops,
        energy_joules: energy_impact(flops, decl.body_line_count, config),
    }
}

/// Convert a flop count and body line count into joules.
///
/// Deterministic and monotonic non-decreasing in each argument with the
/// other held fixed.
pub fn energy_impact(flops: u64, line_count: usize, config: &CalibrationConfig) -> f64 {
    flops as f64 * config.energy_per_flop + line_count as f64 * config.energy_per_line
}

/// Recursive weighted walk. `depth` is the loop-nesting level of `node`.
fn count_ops(node: Node<'_>, depth: u32, config: &CalibrationConfig, acc: &mut f64) {
    let kind = node.kind();
    let multiplier = loop_multiplier(depth, config);

    let child_depth = if LOOP_KINDS.contains(&kind) {
        // The loop header itself does per-iteration work (bound checks,
        // iterator stepping) at the inner level.
        *acc += config.weight_arithmetic as f64 * loop_multiplier(depth + 1, config);
        depth + 1
    } else {
        if ARITHMETIC_KINDS.contains(&kind) {
            *acc += config.weight_arithmetic as f64 * multiplier;
        } else if COMPARISON_KINDS.contains(&kind) {
            *acc += config.weight_comparison as f64 * multiplier;
        } else if kind == "call" {
            *acc += config.weight_call as f64 * multiplier;
        }
        depth
    };

    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    for child in children {
        count_ops(child, child_depth, config, acc);
    }
}

/// Iteration multiplier for a nesting level, capped so pathological
/// nesting cannot overflow the count.
fn loop_multiplier(depth: u32, config: &CalibrationConfig) -> f64 {
    config
        .loop_iteration_weight
        .powi(depth.min(config.max_loop_depth) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{extract_functions, parse_source};

    fn estimate(source: &str) -> Vec<CostEstimate> {
        let unit = parse_source(1, "test.py", source).unwrap();
        let config = CalibrationConfig::default();
        extract_functions(&unit)
            .iter()
            .map(|d| estimate_function(&unit, d, &config))
            .collect()
    }

    #[test]
    fn test_trivial_body_has_baseline_energy() {
        let est = estimate("def f():\n    pass\n");
        assert_eq!(est[0].flops, 0);
        // Line-count baseline keeps the figure positive
        assert!(est[0].energy_joules > 0.0);
    }

    #[test]
    fn test_arithmetic_counts() {
        let est = estimate("def f(a, b):\n    return a + b\n");
        assert!(est[0].flops >= 1);
    }

    #[test]
    fn test_loop_scales_contents() {
        let flat = estimate("def f(xs):\n    y = xs[0] + 1\n    return y\n");
        let looped = estimate("def f(xs):\n    y = 0\n    for x in xs:\n        y = y + 1\n    return y\n");
        assert!(looped[0].flops > flat[0].flops);
    }

    #[test]
    fn test_nested_loop_scales_further() {
        let single = estimate("def f(n):\n    t = 0\n    for i in range(n):\n        t = t + i\n    return t\n");
        let double = estimate(
            "def f(n):\n    t = 0\n    for i in range(n):\n        for j in range(n):\n            t = t + i\n    return t\n",
        );
        assert!(double[0].flops > single[0].flops);
    }

    #[test]
    fn test_comprehension_counts_as_loop() {
        let flat = estimate("def f(xs):\n    return xs\n");
        let comp = estimate("def f(xs):\n    return [x + 1 for x in xs]\n");
        assert!(comp[0].flops > flat[0].flops);
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        let mut body = String::from("def f(n):\n");
        let mut indent = String::from("    ");
        for var in ["a", "b", "c", "d", "e", "g", "h", "i", "j", "k"] {
            body.push_str(&format!("{indent}for {var} in range(n):\n"));
            indent.push_str("    ");
        }
        body.push_str(&format!("{indent}n = n + 1\n"));

        let est = estimate(&body);
        assert!(est[0].flops > 0);
        assert!(est[0].energy_joules.is_finite());
    }

    #[test]
    fn test_determinism() {
        let source = "def f(n):\n    t = 0\n    for i in range(n):\n        t = t + i * i\n    return t\n";
        assert_eq!(estimate(source), estimate(source));
    }

    #[test]
    fn test_energy_monotonic_in_flops() {
        let config = CalibrationConfig::default();
        let low = energy_impact(10, 5, &config);
        let high = energy_impact(20, 5, &config);
        assert!(high >= low);
    }

    #[test]
    fn test_energy_monotonic_in_lines() {
        let config = CalibrationConfig::default();
        let short = energy_impact(10, 5, &config);
        let long = energy_impact(10, 50, &config);
        assert!(long >= short);
    }
}
