//! Result assembly and output rendering - structured JSON and marker text.
//!
//! Both renderings derive from the same [`AnalysisResult`] and agree on
//! every field. The text form keeps fixed markers (`function:`, `lines:`,
//! `estimated flops:`, `energy impact:`) so a downstream consumer can
//! reconstruct fields by substring matching when structured emission is
//! unavailable.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::{CalibrationConfig, TotalEnergyMode};
use crate::estimate::CostEstimate;
use crate::parse::{FunctionDecl, SourceUnit};

/// Per-function entry of an [`AnalysisResult`].
///
/// Serialized fields follow the external record schema; fields the
/// collaborators don't consume (byte offsets, decorator texts) stay
/// internal for the removal generator and annotation pass.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionRecord {
    #[serde(skip)]
    pub id: u32,
    /// Simple name, for scope-local lookups.
    #[serde(skip)]
    pub simple_name: String,
    /// Qualified dotted name, unique within its enclosing scope.
    #[serde(rename = "name")]
    pub qualified_name: String,
    pub is_unused: bool,
    pub is_async: bool,
    pub is_threaded: bool,
    /// Line span of the function body.
    pub line_count: usize,
    pub estimated_flops: u64,
    /// Joules; non-negative, deterministic in flops and line count.
    pub energy_impact: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_suggestion: Option<String>,
    #[serde(skip)]
    pub start_line: usize,
    #[serde(skip)]
    pub end_line: usize,
    #[serde(skip)]
    pub start_byte: usize,
    #[serde(skip)]
    pub end_byte: usize,
    #[serde(skip)]
    pub decorators: Vec<String>,
}

/// A function rewritten by the annotation provider.
#[derive(Debug, Clone, Serialize)]
pub struct RewrittenFunction {
    pub name: String,
    pub original: String,
    pub improved: String,
}

/// One analyzed file's complete result.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub file_id: u32,
    pub filename: String,
    /// Function records in declaration order.
    pub analyses: Vec<FunctionRecord>,
    /// Aggregate energy (joules); unused-only by default, see
    /// [`TotalEnergyMode`].
    pub total_energy: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaned_file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten_functions: Option<Vec<RewrittenFunction>>,
}

impl AnalysisResult {
    /// Records flagged as dead code, in declaration order.
    pub fn unused(&self) -> impl Iterator<Item = &FunctionRecord> {
        self.analyses.iter().filter(|r| r.is_unused)
    }

    /// Whether any function was flagged.
    pub fn has_unused(&self) -> bool {
        self.analyses.iter().any(|r| r.is_unused)
    }
}

/// Merge declarations, reachability, and cost estimates into one result.
///
/// `estimates` must be index-aligned with `decls`.
pub fn assemble(
    unit: &SourceUnit,
    decls: &[FunctionDecl],
    reachable: &HashSet<u32>,
    estimates: &[CostEstimate],
    config: &CalibrationConfig,
) -> AnalysisResult {
    debug_assert_eq!(decls.len(), estimates.len());

    let dead: HashSet<u32> = crate::classify::find_dead(decls, reachable)
        .into_iter()
        .collect();

    let analyses: Vec<FunctionRecord> = decls
        .iter()
        .zip(estimates)
        .map(|(decl, est)| FunctionRecord {
            id: decl.id,
            simple_name: decl.name.clone(),
            qualified_name: decl.qualified_name.clone(),
            is_unused: dead.contains(&decl.id),
            is_async: decl.is_async,
            is_threaded: decl.is_threaded,
            line_count: decl.body_line_count,
            estimated_flops: est.flops,
            energy_impact: est.energy_joules,
            ai_explanation: None,
            ai_suggestion: None,
            start_line: decl.start_line,
            end_line: decl.end_line,
            start_byte: decl.start_byte,
            end_byte: decl.end_byte,
            decorators: decl.decorators.iter().map(|d| d.text.clone()).collect(),
        })
        .collect();

    let total_energy = match config.total_energy_mode {
        TotalEnergyMode::UnusedOnly => analyses
            .iter()
            .filter(|r| r.is_unused)
            .map(|r| r.energy_impact)
            .sum(),
        TotalEnergyMode::AllFunctions => analyses.iter().map(|r| r.energy_impact).sum(),
    };

    AnalysisResult {
        file_id: unit.file_id,
        filename: unit.path.display().to_string(),
        analyses,
        total_energy,
        diff: None,
        cleaned_file_path: None,
        rewritten_functions: None,
    }
}

/// Render the structured JSON record.
pub fn render_json(result: &AnalysisResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

/// Render the fallback marker-text form.
///
/// Derivable from the same record as [`render_json`]; every field agrees.
pub fn render_text(result: &AnalysisResult) -> String {
    let unused: Vec<&FunctionRecord> = result.unused().collect();
    let mut out = String::with_capacity(256 + unused.len() * 160);

    out.push_str(&format!("file: {}\n", result.filename));

    if unused.is_empty() {
        out.push_str("no unused functions detected\n");
    } else {
        out.push_str(&format!("unused/dead functions detected: {}\n", unused.len()));
        out.push_str(&"-".repeat(40));
        out.push('\n');

        for record in &unused {
            out.push('\n');
            out.push_str(&format!("function: {}\n", record.qualified_name));
            out.push_str(&format!("  lines: {}\n", record.line_count));
            out.push_str(&format!("  estimated flops: {}\n", record.estimated_flops));
            out.push_str(&format!("  energy impact: {:.2} joules\n", record.energy_impact));
            if record.is_async {
                out.push_str("  async function\n");
            }
            if record.is_threaded {
                out.push_str("  threaded function\n");
            }
            if let Some(explanation) = &record.ai_explanation {
                out.push_str(&format!("  ai explanation: {}\n", explanation));
            }
            if let Some(suggestion) = &record.ai_suggestion {
                out.push_str(&format!("  ai suggestion: {}\n", suggestion));
            }
        }
    }

    out.push('\n');
    out.push_str(&format!("total energy: {:.2} joules\n", result.total_energy));
    out
}

/// Print a result in JSON form.
///
/// Falls back to the text rendering if serialization fails (should never
/// happen for these types, but all cases are handled).
pub fn print_json(result: &AnalysisResult) {
    match render_json(result) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("[WARN] JSON serialization failed: {}", e);
            println!("{}", render_text(result));
        }
    }
}

/// Print a result in marker-text form.
pub fn print_text(result: &AnalysisResult) {
    print!("{}", render_text(result));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::{extract_usage, CallGraph};
    use crate::estimate::estimate_function;
    use crate::parse::{extract_functions, parse_source};

    fn result_for(source: &str, config: &CalibrationConfig) -> AnalysisResult {
        let unit = parse_source(7, "sample.py", source).unwrap();
        let decls = extract_functions(&unit);
        let usage = extract_usage(&unit, &decls);
        let graph = CallGraph::build(&decls, &usage, config);
        let reachable = graph.compute_reachable();
        let estimates: Vec<_> = decls
            .iter()
            .map(|d| estimate_function(&unit, d, config))
            .collect();
        assemble(&unit, &decls, &reachable, &estimates, config)
    }

    const SAMPLE: &str = "\
def used():
    return 1

def unused_helper(n):
    t = 0
    for i in range(n):
        t = t + i
    return t

used()
";

    #[test]
    fn test_assemble_declaration_order_and_flags() {
        let result = result_for(SAMPLE, &CalibrationConfig::default());
        assert_eq!(result.file_id, 7);
        assert_eq!(result.analyses.len(), 2);
        assert_eq!(result.analyses[0].qualified_name, "used");
        assert!(!result.analyses[0].is_unused);
        assert!(result.analyses[1].is_unused);
    }

    #[test]
    fn test_total_energy_unused_only() {
        let result = result_for(SAMPLE, &CalibrationConfig::default());
        let dead_energy: f64 = result.unused().map(|r| r.energy_impact).sum();
        assert!((result.total_energy - dead_energy).abs() < f64::EPSILON);
        // The live function's energy is excluded
        assert!(result.total_energy < result.analyses.iter().map(|r| r.energy_impact).sum::<f64>());
    }

    #[test]
    fn test_total_energy_all_functions_mode() {
        let config = CalibrationConfig {
            total_energy_mode: TotalEnergyMode::AllFunctions,
            ..CalibrationConfig::default()
        };
        let result = result_for(SAMPLE, &config);
        let all: f64 = result.analyses.iter().map(|r| r.energy_impact).sum();
        assert!((result.total_energy - all).abs() < f64::EPSILON);
    }

    #[test]
    fn test_text_rendering_markers() {
        let result = result_for(SAMPLE, &CalibrationConfig::default());
        let text = render_text(&result);
        assert!(text.contains("unused/dead functions detected:"));
        assert!(text.contains("function: unused_helper"));
        assert!(text.contains("lines:"));
        assert!(text.contains("estimated flops:"));
        assert!(text.contains("energy impact:"));
    }

    #[test]
    fn test_text_marker_lines_for_async_and_threaded() {
        let source = "\
async def stale_fetch():
    return 1
";
        let result = result_for(source, &CalibrationConfig::default());
        let text = render_text(&result);
        assert!(text.contains("async function"));
        assert!(!text.contains("threaded function"));
    }

    #[test]
    fn test_renderings_agree() {
        let result = result_for(SAMPLE, &CalibrationConfig::default());
        let text = render_text(&result);
        let json: serde_json::Value =
            serde_json::from_str(&render_json(&result).unwrap()).unwrap();

        for entry in json["analyses"].as_array().unwrap() {
            if entry["is_unused"].as_bool().unwrap() {
                let name = entry["name"].as_str().unwrap();
                assert!(text.contains(&format!("function: {}", name)));
                assert!(text.contains(&format!(
                    "estimated flops: {}",
                    entry["estimated_flops"].as_u64().unwrap()
                )));
            }
        }
        assert_eq!(json["file_id"].as_u64(), Some(7));
        assert_eq!(json["filename"].as_str(), Some("sample.py"));
    }

    #[test]
    fn test_json_omits_absent_optional_fields() {
        let result = result_for(SAMPLE, &CalibrationConfig::default());
        let json = render_json(&result).unwrap();
        assert!(!json.contains("ai_explanation"));
        assert!(!json.contains("diff"));
        assert!(!json.contains("cleaned_file_path"));
    }

    #[test]
    fn test_no_unused_message() {
        let result = result_for("def main():\n    pass\n\nmain()\n", &CalibrationConfig::default());
        let text = render_text(&result);
        assert!(text.contains("no unused functions detected"));
    }
}
