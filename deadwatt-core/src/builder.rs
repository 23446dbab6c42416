//! Builder pattern API for deadwatt analysis.
//!
//! Provides a fluent interface for configuring and running dead code
//! analysis:
//!
//! ```rust,ignore
//! use deadwatt_core::prelude::*;
//!
//! let batch = Deadwatt::new("/path/to/project")
//!     .include_diff(true)
//!     .analyze()?;
//!
//! for result in batch.results() {
//!     println!("{}: {} unused", result.filename, result.unused().count());
//! }
//! ```
//!
//! Each file is an independent, synchronous pipeline (parse, call graph,
//! reachability, estimate, assemble); files run in parallel with no
//! shared mutable state beyond the read-only calibration constants.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::warn;

use crate::callgraph::{extract_usage, CallGraph};
use crate::config::{CalibrationConfig, TotalEnergyMode};
use crate::error::{DeadwattError, DeadwattResult};
use crate::estimate::estimate_function;
use crate::parse::{extract_functions, parse_source};
#[cfg(feature = "removal")]
use crate::removal;
use crate::report::{assemble, AnalysisResult};
use crate::scan::gather_py_files_with_excludes;

/// Builder for configuring dead code analysis.
#[derive(Debug, Clone)]
pub struct Deadwatt {
    /// File or directory to analyze
    root: PathBuf,

    /// Calibration constants (estimator weights, amnesty list, totals mode)
    calibration: CalibrationConfig,

    /// Attach a unified diff to results with unused functions
    include_diff: bool,

    /// Write a `.cleaned.py` sibling with unused functions removed
    safe_removal: bool,

    /// Don't write any file, even with safe_removal enabled
    dry_run: bool,

    /// Function name patterns never flagged as unused
    ignored_patterns: Vec<String>,

    /// Extra directory names to skip while scanning
    excluded_dirs: Vec<String>,
}

impl Deadwatt {
    /// Create a new analysis builder for the given file or directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            calibration: CalibrationConfig::default(),
            include_diff: false,
            safe_removal: false,
            dry_run: false,
            ignored_patterns: Vec::new(),
            excluded_dirs: Vec::new(),
        }
    }

    /// Replace the calibration constants.
    pub fn with_calibration(mut self, calibration: CalibrationConfig) -> Self {
        self.calibration = calibration;
        self
    }

    /// Attach unified diffs for files with unused functions.
    pub fn include_diff(mut self, enabled: bool) -> Self {
        self.include_diff = enabled;
        self
    }

    /// Write cleaned `.cleaned.py` siblings.
    pub fn safe_removal(mut self, enabled: bool) -> Self {
        self.safe_removal = enabled;
        self
    }

    /// Suppress all file writes.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Sum `total_energy` over all functions instead of unused only.
    pub fn total_energy_mode(mut self, mode: TotalEnergyMode) -> Self {
        self.calibration.total_energy_mode = mode;
        self
    }

    /// Add patterns for function names to ignore (never flag unused).
    pub fn ignore_patterns(
        mut self,
        patterns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.ignored_patterns
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Add directories to exclude from scanning.
    pub fn exclude_dirs(mut self, dirs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.excluded_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Run the analysis and return per-file outcomes.
    ///
    /// A parse failure in one file never aborts its siblings; each
    /// outcome carries its own result or error.
    pub fn analyze(&self) -> Result<BatchResult> {
        let files: Vec<PathBuf> = if self.root.is_file() {
            vec![self.root.clone()]
        } else {
            let excludes: Vec<&str> = self.excluded_dirs.iter().map(String::as_str).collect();
            gather_py_files_with_excludes(&self.root, &excludes)
                .context("Failed to gather .py files")?
        };

        let outcomes: Vec<FileOutcome> = files
            .par_iter()
            .enumerate()
            .map(|(index, path)| {
                let file_id = index as u32 + 1;
                let result = std::fs::read_to_string(path)
                    .map_err(|e| DeadwattError::io(path.clone(), e))
                    .and_then(|source| self.analyze_source(file_id, path, &source));
                if let Err(e) = &result {
                    warn!(file = %path.display(), error = %e, "analysis failed");
                }
                FileOutcome {
                    path: path.clone(),
                    result,
                }
            })
            .collect();

        Ok(BatchResult { outcomes })
    }

    /// Analyze a single source text (the per-file pipeline).
    ///
    /// Exposed for collaborators that hold the text already, such as an
    /// editor shell re-analyzing on save.
    pub fn analyze_source(
        &self,
        file_id: u32,
        path: &Path,
        source: &str,
    ) -> DeadwattResult<AnalysisResult> {
        let unit = parse_source(file_id, path.to_path_buf(), source.to_string())?;
        let decls = extract_functions(&unit);
        let usage = extract_usage(&unit, &decls);
        let graph = CallGraph::build(&decls, &usage, &self.calibration);

        let stats = graph.stats();
        if stats.unresolved_edges > 0 {
            warn!(
                file = %path.display(),
                unresolved = stats.unresolved_edges,
                "call targets not statically determined; referenced names kept live"
            );
        }

        let reachable = graph.compute_reachable();
        let estimates: Vec<_> = decls
            .iter()
            .map(|d| estimate_function(&unit, d, &self.calibration))
            .collect();

        let mut result = assemble(&unit, &decls, &reachable, &estimates, &self.calibration);
        self.apply_ignore(&mut result);

        #[cfg(feature = "removal")]
        if (self.include_diff || self.safe_removal) && result.has_unused() {
            match removal::remove_unused(source, &result.filename, &result.analyses) {
                Ok(Some(outcome)) => {
                    if self.include_diff {
                        result.diff = Some(outcome.diff);
                    }
                    if self.safe_removal && !self.dry_run {
                        match removal::write_cleaned(path, &outcome.cleaned) {
                            Ok(target) => {
                                result.cleaned_file_path =
                                    Some(target.display().to_string());
                            }
                            Err(e) => warn!(file = %path.display(), error = %e, "cleaned write failed"),
                        }
                    }
                }
                Ok(None) => {}
                // Removal is non-fatal: the result stands, the source is
                // left untouched.
                Err(e) => warn!(file = %path.display(), error = %e, "removal aborted"),
            }
        }

        Ok(result)
    }

    /// Clear the unused flag on records matching an ignore pattern and
    /// recompute the energy total.
    fn apply_ignore(&self, result: &mut AnalysisResult) {
        if self.ignored_patterns.is_empty() {
            return;
        }
        for record in &mut result.analyses {
            if record.is_unused && self.is_ignored(&record.simple_name) {
                record.is_unused = false;
            }
        }
        result.total_energy = match self.calibration.total_energy_mode {
            TotalEnergyMode::UnusedOnly => result
                .analyses
                .iter()
                .filter(|r| r.is_unused)
                .map(|r| r.energy_impact)
                .sum(),
            TotalEnergyMode::AllFunctions => {
                result.analyses.iter().map(|r| r.energy_impact).sum()
            }
        };
    }

    /// Check if a function name matches any ignored pattern.
    fn is_ignored(&self, name: &str) -> bool {
        for pattern in &self.ignored_patterns {
            if pattern.ends_with('*') {
                let prefix = &pattern[..pattern.len() - 1];
                if name.starts_with(prefix) {
                    return true;
                }
            } else if let Some(suffix) = pattern.strip_prefix('*') {
                if name.ends_with(suffix) {
                    return true;
                }
            } else if name == pattern {
                return true;
            }
        }
        false
    }
}

/// One file's outcome: a complete result or that file's fatal error.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: DeadwattResult<AnalysisResult>,
}

/// Result of analyzing a batch of files.
#[derive(Debug)]
pub struct BatchResult {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchResult {
    /// Successfully analyzed results, in file order.
    pub fn results(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Failed files with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &DeadwattError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.path.as_path(), e)))
    }

    /// Whether every input parsed and analyzed.
    pub fn all_parsed(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Total unused functions across the batch.
    pub fn total_unused(&self) -> usize {
        self.results().map(|r| r.unused().count()).sum()
    }

    /// Sum of per-file energy totals.
    pub fn total_energy(&self) -> f64 {
        self.results().map(|r| r.total_energy).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn create_test_project() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "deadwatt_builder_test_{}_{}",
            std::process::id(),
            id
        ));

        if dir.exists() {
            fs::remove_dir_all(&dir).ok();
        }
        fs::create_dir_all(&dir).expect("Failed to create test directory");

        fs::write(
            dir.join("app.py"),
            "def used():\n    return 1\n\ndef unused():\n    return 2\n\nused()\n",
        )
        .expect("Failed to write app.py");

        fs::write(
            dir.join("broken.py"),
            "def broken(:\n",
        )
        .expect("Failed to write broken.py");

        dir
    }

    #[test]
    fn test_batch_continues_past_syntax_error() {
        let dir = create_test_project();

        let batch = Deadwatt::new(&dir).analyze().unwrap();
        assert_eq!(batch.outcomes.len(), 2);
        assert!(!batch.all_parsed());
        assert_eq!(batch.results().count(), 1);
        assert_eq!(batch.failures().count(), 1);

        let (failed_path, err) = batch.failures().next().unwrap();
        assert!(failed_path.ends_with("broken.py"));
        assert!(matches!(err, DeadwattError::Parse { .. }));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_single_file_analysis() {
        let dir = create_test_project();

        let batch = Deadwatt::new(dir.join("app.py")).analyze().unwrap();
        assert!(batch.all_parsed());
        assert_eq!(batch.total_unused(), 1);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_ignore_patterns_clear_unused() {
        let dir = create_test_project();

        let batch = Deadwatt::new(dir.join("app.py"))
            .ignore_patterns(["unused"])
            .analyze()
            .unwrap();
        assert_eq!(batch.total_unused(), 0);
        // The total follows the cleared flag
        assert_eq!(batch.total_energy(), 0.0);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_diff_attached_when_requested() {
        let dir = create_test_project();

        let batch = Deadwatt::new(dir.join("app.py"))
            .include_diff(true)
            .analyze()
            .unwrap();
        let result = batch.results().next().unwrap();
        let diff = result.diff.as_ref().expect("diff attached");
        assert!(diff.contains("-def unused():"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_safe_removal_writes_cleaned_sibling() {
        let dir = create_test_project();

        let batch = Deadwatt::new(dir.join("app.py"))
            .safe_removal(true)
            .analyze()
            .unwrap();
        let result = batch.results().next().unwrap();
        let cleaned_path = result.cleaned_file_path.as_ref().expect("cleaned written");
        let cleaned = fs::read_to_string(cleaned_path).unwrap();
        assert!(!cleaned.contains("def unused"));
        assert!(cleaned.contains("def used"));
        // The original is untouched
        let original = fs::read_to_string(dir.join("app.py")).unwrap();
        assert!(original.contains("def unused"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = create_test_project();

        let batch = Deadwatt::new(dir.join("app.py"))
            .safe_removal(true)
            .dry_run(true)
            .analyze()
            .unwrap();
        let result = batch.results().next().unwrap();
        assert!(result.cleaned_file_path.is_none());
        assert!(!dir.join("app.py.cleaned.py").exists());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_file_ids_follow_scan_order() {
        let dir = create_test_project();

        let batch = Deadwatt::new(&dir).analyze().unwrap();
        // Scan order is sorted: app.py before broken.py
        assert!(batch.outcomes[0].path.ends_with("app.py"));
        let first = batch.outcomes[0].result.as_ref().unwrap();
        assert_eq!(first.file_id, 1);

        fs::remove_dir_all(&dir).ok();
    }
}
