//! Safe removal of dead functions with diff generation.
//!
//! Excises exactly the flagged functions' line ranges (decorators
//! included) and leaves every other byte untouched. The cleaned text is
//! re-parsed before it is returned; if the residue no longer parses the
//! removal is aborted and reported as a non-fatal warning, never emitted.
//!
//! The unified diff is generated directly from the removed ranges:
//! removal only ever deletes whole line ranges, so hunks are pure
//! deletions with surrounding context.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DeadwattError, DeadwattResult};
use crate::parse::reparses_cleanly;
use crate::report::FunctionRecord;

/// Context lines shown around each deletion hunk.
const CONTEXT_LINES: usize = 3;

/// Output of a successful removal.
#[derive(Debug, Clone)]
pub struct RemovalOutcome {
    /// Source with the dead functions' lines excised.
    pub cleaned: String,
    /// Unified diff, original → cleaned.
    pub diff: String,
    /// Qualified names of the removed functions.
    pub removed_functions: Vec<String>,
}

/// Remove every `is_unused` function from `source`.
///
/// Returns `Ok(None)` when nothing is flagged. Fails with a `Removal`
/// error when the cleaned text no longer parses; the caller must then
/// keep the original source untouched.
pub fn remove_unused(
    source: &str,
    filename: &str,
    records: &[FunctionRecord],
) -> DeadwattResult<Option<RemovalOutcome>> {
    let dead: Vec<&FunctionRecord> = records.iter().filter(|r| r.is_unused).collect();
    if dead.is_empty() {
        return Ok(None);
    }

    // 0-based inclusive line ranges, merged so nested dead functions
    // collapse into their enclosing range
    let mut ranges: Vec<(usize, usize)> = dead
        .iter()
        .map(|r| (r.start_line.saturating_sub(1), r.end_line.saturating_sub(1)))
        .collect();
    ranges.sort_unstable();
    let ranges = merge_ranges(ranges);

    let lines: Vec<&str> = source.split('\n').collect();
    let cleaned_lines: Vec<&str> = lines
        .iter()
        .enumerate()
        .filter(|(idx, _)| !ranges.iter().any(|&(a, b)| *idx >= a && *idx <= b))
        .map(|(_, line)| *line)
        .collect();
    let cleaned = cleaned_lines.join("\n");

    if !reparses_cleanly(&cleaned) {
        return Err(DeadwattError::removal(
            filename,
            "cleaned source no longer parses; original left untouched",
        ));
    }

    // Real line count: `split('\n')` yields a trailing empty element when
    // the source ends with a newline
    let line_count = if source.ends_with('\n') {
        lines.len() - 1
    } else {
        lines.len()
    };

    Ok(Some(RemovalOutcome {
        diff: unified_diff(filename, &lines, line_count, &ranges),
        cleaned,
        removed_functions: dead.iter().map(|r| r.qualified_name.clone()).collect(),
    }))
}

/// Write the cleaned text next to the original as `<file>.cleaned.py`.
pub fn write_cleaned(original: &Path, cleaned: &str) -> DeadwattResult<PathBuf> {
    let target = PathBuf::from(format!("{}.cleaned.py", original.display()));
    fs::write(&target, cleaned).map_err(|e| DeadwattError::io(&target, e))?;
    Ok(target)
}

/// Merge sorted, possibly-overlapping inclusive ranges.
fn merge_ranges(sorted: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(sorted.len());
    for (start, end) in sorted {
        match merged.last_mut() {
            Some((_, prev_end)) if start <= *prev_end + 1 => {
                *prev_end = (*prev_end).max(end);
            }
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Unified diff for pure line deletions.
///
/// Ranges closer than twice the context width share one hunk so context
/// lines never overlap between hunks.
fn unified_diff(
    filename: &str,
    lines: &[&str],
    line_count: usize,
    removed: &[(usize, usize)],
) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(&format!("--- a/{}\n", filename));
    out.push_str(&format!("+++ b/{}\n", filename));

    // Cluster ranges whose context would otherwise overlap
    let mut clusters: Vec<Vec<(usize, usize)>> = Vec::new();
    for &range in removed {
        match clusters.last_mut() {
            Some(cluster)
                if range.0 <= cluster.last().unwrap().1 + 2 * CONTEXT_LINES + 1 =>
            {
                cluster.push(range);
            }
            _ => clusters.push(vec![range]),
        }
    }

    let mut removed_before = 0usize;
    for cluster in clusters {
        let first = cluster.first().unwrap().0;
        let last = cluster.last().unwrap().1.min(line_count.saturating_sub(1));
        let hunk_start = first.saturating_sub(CONTEXT_LINES);
        let hunk_end = (last + CONTEXT_LINES).min(line_count.saturating_sub(1));

        let old_count = hunk_end - hunk_start + 1;
        let removed_in_cluster: usize = cluster
            .iter()
            .map(|&(a, b)| b.min(line_count.saturating_sub(1)) - a + 1)
            .sum();
        let new_count = old_count - removed_in_cluster;
        let new_start = if new_count == 0 {
            hunk_start - removed_before
        } else {
            hunk_start - removed_before + 1
        };

        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            hunk_start + 1,
            old_count,
            new_start,
            new_count
        ));
        for idx in hunk_start..=hunk_end {
            let deleted = cluster.iter().any(|&(a, b)| idx >= a && idx <= b);
            out.push(if deleted { '-' } else { ' ' });
            out.push_str(lines[idx]);
            out.push('\n');
        }

        removed_before += removed_in_cluster;
    }

    out
}
