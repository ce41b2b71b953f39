//! Applying suggested variable rewrites to source files.
//!
//! Every suggestion is an edit set that has to land as a whole. Group mates
//! carry the same set, so sets are deduplicated before application.

use crate::diagnostics::{Applicability, Diagnostic};
use crate::fix::{self, TextEdit};
use itertools::Itertools;
use std::path::Path;

/// Result of applying fixes to a source file.
#[derive(Debug)]
pub struct FixResult {
    /// The modified source code.
    pub fixed_source: String,
    /// Number of edit sets applied.
    pub fixes_applied: usize,
    /// Edit sets left out (placeholders, or conflicting with an applied set).
    pub fixes_skipped: usize,
}

/// Error when applying fixes.
#[derive(Debug, thiserror::Error)]
pub enum FixError {
    #[error("source of {0} changed since it was exported; re-run the front end")]
    StaleSource(String),

    #[error(transparent)]
    Edit(#[from] fix::FixError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Apply the suggestions carried by `diagnostics` to `source`.
///
/// Sets with `<# ... #>` placeholders are skipped unless
/// `allow_placeholders` is set. A set that conflicts with one already
/// accepted is skipped entirely.
pub fn apply_suggestions(
    source: &str,
    diagnostics: &[Diagnostic],
    allow_placeholders: bool,
) -> Result<FixResult, FixError> {
    let mut accepted: Vec<TextEdit> = Vec::new();
    let mut applied = 0;
    let mut skipped = 0;

    let sets = diagnostics
        .iter()
        .filter_map(|diag| diag.suggestion.as_ref())
        .filter(|suggestion| !suggestion.edits.is_empty())
        .unique_by(|suggestion| suggestion.edits.clone());

    for suggestion in sets {
        if suggestion.applicability == Applicability::HasPlaceholders && !allow_placeholders {
            skipped += 1;
            continue;
        }
        let mut candidate = accepted.clone();
        candidate.extend(suggestion.edits.iter().cloned());
        if fix::any_conflict(&candidate) {
            skipped += 1;
            continue;
        }
        accepted = candidate;
        applied += 1;
    }

    let fixed_source = fix::apply_fixes(source, &accepted)?;
    Ok(FixResult {
        fixed_source,
        fixes_applied: applied,
        fixes_skipped: skipped,
    })
}

/// Fails when the file on disk no longer matches the text the export was
/// made from.
pub fn ensure_fresh(path: &Path, exported: &str, on_disk: &str) -> Result<(), FixError> {
    if exported == on_disk {
        Ok(())
    } else {
        Err(FixError::StaleSource(path.display().to_string()))
    }
}

/// Generate a unified diff between original and fixed source.
///
/// Includes context lines (3 lines before and after each change) for better readability.
pub fn format_diff(original: &str, fixed: &str, path: &Path) -> String {
    format_diff_with_context(original, fixed, path, 3)
}

/// Generate a unified diff with configurable context lines.
pub fn format_diff_with_context(
    original: &str,
    fixed: &str,
    path: &Path,
    context: usize,
) -> String {
    use std::fmt::Write;

    let path_str = path.display().to_string();
    let mut output = String::new();

    let _ = writeln!(output, "--- a/{path_str}");
    let _ = writeln!(output, "+++ b/{path_str}");

    let orig_lines: Vec<&str> = original.lines().collect();
    let fixed_lines: Vec<&str> = fixed.lines().collect();

    // Line-by-line comparison; rewrites never add or remove lines except
    // for overload stubs appended after a function body.
    let max_len = orig_lines.len().max(fixed_lines.len());
    let changed: Vec<usize> = (0..max_len)
        .filter(|&i| orig_lines.get(i) != fixed_lines.get(i))
        .collect();

    if changed.is_empty() {
        return String::new();
    }

    let mut hunks: Vec<(usize, usize, Vec<usize>)> = Vec::new();
    for i in changed {
        let start = i.saturating_sub(context);
        let end = (i + context + 1).min(max_len);
        match hunks.last_mut() {
            Some((_, hunk_end, lines)) if start <= *hunk_end => {
                *hunk_end = end;
                lines.push(i);
            }
            _ => hunks.push((start, end, vec![i])),
        }
    }

    for (hunk_start, hunk_end, lines) in hunks {
        let orig_size = hunk_end.min(orig_lines.len()).saturating_sub(hunk_start);
        let fixed_size = hunk_end.min(fixed_lines.len()).saturating_sub(hunk_start);

        let _ = writeln!(
            output,
            "@@ -{},{} +{},{} @@",
            hunk_start + 1,
            orig_size,
            hunk_start + 1,
            fixed_size
        );

        for line_idx in hunk_start..hunk_end {
            if lines.contains(&line_idx) {
                if let Some(orig) = orig_lines.get(line_idx) {
                    let _ = writeln!(output, "-{orig}");
                }
                if let Some(fix) = fixed_lines.get(line_idx) {
                    let _ = writeln!(output, "+{fix}");
                }
            } else if let Some(line) = orig_lines.get(line_idx) {
                let _ = writeln!(output, " {line}");
            }
        }
    }

    output
}
