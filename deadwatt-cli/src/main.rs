//! deadwatt CLI - dead-code and energy-impact analyzer for Python projects.
//!
//! Features:
//! - File or directory input with parallel per-file analysis
//! - JSON or marker-text output per analyzed file
//! - Unified-diff and safe-removal modes
//! - Self-contained HTML report generation
//! - CI-friendly exit codes: 0 iff every input parsed

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

use deadwatt_core::{
    generate_html_report, init_structured_logging, load_config, print_json, print_text,
    AnalysisResult, CalibrationConfig, Deadwatt, TotalEnergyMode,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Dead-code and energy-impact analyzer for Python")]
pub struct Cli {
    /// Path to a Python file or directory
    path: String,

    /// Output results in JSON format
    #[arg(long)]
    json: bool,

    /// Function names or patterns to ignore
    #[arg(long, num_args = 1..)]
    ignore: Vec<String>,

    /// Show unified diffs for suggested deletions
    #[arg(long)]
    diff: bool,

    /// Write cleaned copies with dead functions removed (<file>.cleaned.py)
    #[arg(long)]
    safe_remove: bool,

    /// Generate an HTML report
    #[arg(long)]
    html: bool,

    /// Write the HTML report to a specified file instead of stdout
    #[arg(long, value_name = "FILE")]
    html_file: Option<String>,

    /// Sum total_energy over all functions instead of unused only
    #[arg(long)]
    total_all: bool,
}

/// Security: Validates output file paths to prevent path traversal attacks.
///
/// Rejects:
/// - Absolute paths (must be relative to current directory)
/// - Paths containing `..` (parent directory traversal)
/// - Paths with null bytes (injection attacks)
fn validate_output_path(path: &str) -> Result<PathBuf> {
    if path.contains('\0') {
        return Err(anyhow!("Output path contains null bytes"));
    }

    let p = PathBuf::from(path);

    if p.is_absolute() {
        return Err(anyhow!(
            "Output path must be relative, not absolute: {}",
            path
        ));
    }

    for component in p.components() {
        if matches!(component, std::path::Component::ParentDir) {
            return Err(anyhow!(
                "Path traversal (..) not allowed in output paths: {}",
                path
            ));
        }
    }

    Ok(p)
}

fn main() -> Result<()> {
    // Global panic guard - the process always exits with a defined code
    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] deadwatt internal error: {}", info);
        eprintln!("[PANIC] The process will exit safely with code 2.");
    }));

    // Structured logging (JSON to stderr, respects RUST_LOG)
    init_structured_logging();

    let cli = Cli::parse();

    let input = Path::new(&cli.path);
    if !input.exists() {
        eprintln!("[ERROR] {} is not a valid file or directory", cli.path);
        std::process::exit(2);
    }

    // Project configuration: deadwatt.toml next to the input (or inside it)
    let config_root = if input.is_dir() {
        input.to_path_buf()
    } else {
        input.parent().map(Path::to_path_buf).unwrap_or_default()
    };
    let project_config = load_config(&config_root)
        .with_context(|| format!("Failed to load config from {}", config_root.display()))?;

    let mut calibration = project_config
        .as_ref()
        .and_then(|c| c.calibration.as_ref())
        .cloned()
        .unwrap_or_else(CalibrationConfig::default);
    if cli.total_all {
        calibration.total_energy_mode = TotalEnergyMode::AllFunctions;
    }

    let mut ignore = cli.ignore.clone();
    if let Some(config_ignore) = project_config.as_ref().and_then(|c| c.ignore.as_ref()) {
        ignore.extend(config_ignore.iter().cloned());
    }

    let batch = Deadwatt::new(input)
        .with_calibration(calibration)
        .include_diff(cli.diff)
        .safe_removal(cli.safe_remove)
        .ignore_patterns(ignore)
        .analyze()?;

    // Per-file reporting; failures are listed independently
    for result in batch.results() {
        if cli.json {
            print_json(result);
        } else {
            print_text(result);
            println!();
        }
    }

    for (path, err) in batch.failures() {
        if cli.json {
            let record = serde_json::json!({
                "filename": path.display().to_string(),
                "error": err.to_string(),
            });
            eprintln!("{}", record);
        } else {
            eprintln!("[ERROR] {}: {}", path.display(), err);
        }
    }

    if cli.diff && !cli.json {
        for result in batch.results() {
            if let Some(diff) = &result.diff {
                println!("diff for {} (suggested deletions):", result.filename);
                println!("{}", diff);
            }
        }
    }

    // HTML report (if requested)
    if cli.html || cli.html_file.is_some() {
        let results: Vec<AnalysisResult> = batch.results().cloned().collect();
        let html = generate_html_report(&results);

        if let Some(ref file) = cli.html_file {
            match validate_output_path(file) {
                Ok(safe_path) => {
                    if let Err(e) = fs::write(&safe_path, &html) {
                        eprintln!("[WARN] HTML write failed to {}: {}", safe_path.display(), e);
                    } else {
                        println!("HTML report saved to: {}", safe_path.display());
                    }
                }
                Err(e) => {
                    eprintln!("[ERROR] Invalid output path: {}", e);
                    std::process::exit(2);
                }
            }
        } else {
            println!("{}", html);
        }
    }

    // Exit code: 0 iff every input parsed and analyzed
    std::process::exit(if batch.all_parsed() { 0 } else { 1 });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn create_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::File::create(path)
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
    }

    fn create_temp_dir(name: &str) -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let temp_dir = std::env::temp_dir()
            .join("deadwatt_cli_test")
            .join(format!("{}_{}_{}", name, std::process::id(), id));
        if temp_dir.exists() {
            fs::remove_dir_all(&temp_dir).ok();
        }
        fs::create_dir_all(&temp_dir).unwrap();
        temp_dir
    }

    // --- validate_output_path TESTS ---

    #[test]
    fn test_validate_output_path_relative_ok() {
        assert!(validate_output_path("report.html").is_ok());
        assert!(validate_output_path("out/report.html").is_ok());
    }

    #[test]
    fn test_validate_output_path_rejects_absolute() {
        assert!(validate_output_path("/etc/report.html").is_err());
    }

    #[test]
    fn test_validate_output_path_rejects_traversal() {
        assert!(validate_output_path("../report.html").is_err());
        assert!(validate_output_path("out/../../report.html").is_err());
    }

    #[test]
    fn test_validate_output_path_rejects_null_bytes() {
        assert!(validate_output_path("report\0.html").is_err());
    }

    // --- batch behavior through the builder ---

    #[test]
    fn test_batch_exit_condition_all_parsed() {
        let dir = create_temp_dir("all_parsed");
        create_file(&dir.join("ok.py"), "def f():\n    pass\n\nf()\n");

        let batch = Deadwatt::new(&dir).analyze().unwrap();
        assert!(batch.all_parsed());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_batch_exit_condition_with_failure() {
        let dir = create_temp_dir("with_failure");
        create_file(&dir.join("ok.py"), "def f():\n    pass\n\nf()\n");
        create_file(&dir.join("bad.py"), "def broken(:\n");

        let batch = Deadwatt::new(&dir).analyze().unwrap();
        assert!(!batch.all_parsed());
        assert_eq!(batch.results().count(), 1);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_ignore_merges_with_cli() {
        let dir = create_temp_dir("config_merge");
        create_file(&dir.join("deadwatt.toml"), "ignore = [\"legacy_*\"]\n");
        create_file(
            &dir.join("app.py"),
            "def legacy_shim():\n    pass\n\ndef gone():\n    pass\n",
        );

        let config = load_config(&dir).unwrap().expect("config present");
        let ignore = config.ignore.unwrap();

        let batch = Deadwatt::new(dir.join("app.py"))
            .ignore_patterns(ignore)
            .analyze()
            .unwrap();
        let result = batch.results().next().unwrap();
        let legacy = result
            .analyses
            .iter()
            .find(|r| r.simple_name == "legacy_shim")
            .unwrap();
        assert!(!legacy.is_unused);
        let gone = result
            .analyses
            .iter()
            .find(|r| r.simple_name == "gone")
            .unwrap();
        assert!(gone.is_unused);

        fs::remove_dir_all(&dir).ok();
    }
}
