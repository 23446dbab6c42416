//! Parallel, deterministic file discovery with efficient directory pruning.
//!
//! Performance optimizations:
//! - Early directory pruning via `WalkDir::filter_entry` (O(1) subtree skip)
//! - Parallel file processing via Rayon's `par_bridge`
//! - Minimal work in parallel threads (only .py extension check)

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories to exclude by default (standard Python project conventions).
const EXCLUDED_DIRS: &[&str] = &[
    "__pycache__",
    ".git",
    ".venv",
    "venv",
    "node_modules",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
];

/// Checks if a directory entry should be pruned (excluded from traversal).
///
/// Called by `WalkDir::filter_entry`; runs sequentially but enables O(1)
/// subtree skipping for excluded directories.
#[inline]
fn is_excluded_dir(entry: &walkdir::DirEntry, excludes: &HashSet<&str>) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| excludes.contains(name))
}

/// Gathers all .py files recursively starting from the root path using
/// parallel iteration.
///
/// Automatically excludes `__pycache__/`, `.git/`, virtualenv directories,
/// and common tool caches. Results are sorted so batch output order is
/// deterministic regardless of traversal interleaving.
pub fn gather_py_files(root: &Path) -> Result<Vec<PathBuf>> {
    gather_py_files_with_excludes(root, &[])
}

/// Gathers all .py files with custom exclusion patterns using early pruning.
pub fn gather_py_files_with_excludes(root: &Path, excludes: &[&str]) -> Result<Vec<PathBuf>> {
    let all_excludes: HashSet<&str> = EXCLUDED_DIRS
        .iter()
        .copied()
        .chain(excludes.iter().copied())
        .collect();

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        // filter_entry prunes entire subtrees before iteration
        .filter_entry(|e| !is_excluded_dir(e, &all_excludes))
        .par_bridge()
        .filter_map(|entry| match entry {
            Ok(e) => {
                let path = e.path();
                if path.is_file() && path.extension().is_some_and(|ext| ext == "py") {
                    Some(Ok(path.to_path_buf()))
                } else {
                    None
                }
            }
            Err(e) => Some(Err(e.into())),
        })
        .collect::<Result<Vec<_>>>()
        .context(format!("Failed to gather .py files from {}", root.display()))?;

    files.sort();
    Ok(files)
}
