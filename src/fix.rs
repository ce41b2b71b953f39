//! Source edits produced by the fix-it machinery.
//!
//! Everything here works on strings and byte offsets; nothing touches the
//! file system.
//!
//! ## Guarantees
//!
//! - Edits are validated to be non-overlapping before application
//! - Edits are applied back to front so earlier offsets stay valid
//! - Edits sharing a start offset keep their relative order

use serde::Serialize;
use thiserror::Error;

use crate::ast::{SourceFile, Span};

/// Error type for fix application operations.
#[derive(Debug, Error)]
pub enum FixError {
    #[error("Overlapping edits detected at byte {0}")]
    OverlappingEdits(usize),

    #[error("Edit range [{start}..{end}) exceeds source length {source_len}")]
    InvalidRange {
        start: usize,
        end: usize,
        source_len: usize,
    },

    #[error("Edit start {start} is after edit end {end}")]
    InvalidEditOrder { start: usize, end: usize },
}

/// One replacement of a byte range; an empty range is an insertion.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TextEdit {
    /// Starting byte offset (inclusive).
    pub start_byte: usize,
    /// Ending byte offset (exclusive).
    pub end_byte: usize,
    /// Text to insert in place of the range [start_byte..end_byte).
    pub replacement: String,
}

impl TextEdit {
    pub fn new(start_byte: usize, end_byte: usize, replacement: impl Into<String>) -> Self {
        Self {
            start_byte,
            end_byte,
            replacement: replacement.into(),
        }
    }

    pub fn delete(start_byte: usize, end_byte: usize) -> Self {
        Self::new(start_byte, end_byte, String::new())
    }

    pub fn insert(byte_offset: usize, text: impl Into<String>) -> Self {
        Self::new(byte_offset, byte_offset, text)
    }

    pub fn replace(start_byte: usize, end_byte: usize, replacement: impl Into<String>) -> Self {
        Self::new(start_byte, end_byte, replacement)
    }

    pub fn replace_span(span: Span, replacement: impl Into<String>) -> Self {
        Self::new(span.start, span.end, replacement)
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start_byte..self.end_byte
    }

    pub fn span(&self) -> Span {
        Span::new(self.start_byte, self.end_byte)
    }

    /// Strict overlap of the two ranges; touching ranges do not overlap.
    pub fn overlaps_with(&self, other: &TextEdit) -> bool {
        self.start_byte < other.end_byte && other.start_byte < self.end_byte
    }

    pub fn validate(&self, source_len: usize) -> Result<(), FixError> {
        if self.start_byte > self.end_byte {
            return Err(FixError::InvalidEditOrder {
                start: self.start_byte,
                end: self.end_byte,
            });
        }

        if self.end_byte > source_len {
            return Err(FixError::InvalidRange {
                start: self.start_byte,
                end: self.end_byte,
                source_len,
            });
        }

        Ok(())
    }
}

/// Validate that a list of edits are non-overlapping and within bounds.
pub fn validate_edits(edits: &[TextEdit], source_len: usize) -> Result<(), FixError> {
    for edit in edits {
        edit.validate(source_len)?;
    }

    for i in 0..edits.len() {
        for j in (i + 1)..edits.len() {
            if edits[i].overlaps_with(&edits[j]) {
                return Err(FixError::OverlappingEdits(edits[i].start_byte));
            }
        }
    }

    Ok(())
}

/// Whether an edit set cannot be applied as one unit. Unlike
/// [`validate_edits`], edits that merely touch count as conflicting, as do
/// two insertions at the same offset.
pub fn any_conflict(edits: &[TextEdit]) -> bool {
    let mut sorted: Vec<&TextEdit> = edits.iter().collect();
    sorted.sort_by_key(|edit| (edit.start_byte, edit.end_byte));
    sorted
        .windows(2)
        .any(|pair| pair[1].start_byte <= pair[0].end_byte)
}

/// Whether any edit starts or ends inside a macro expansion.
pub fn touches_macro(edits: &[TextEdit], file: &SourceFile) -> bool {
    edits.iter().any(|edit| {
        let last = if edit.end_byte > edit.start_byte {
            edit.end_byte - 1
        } else {
            edit.start_byte
        };
        file.in_macro(edit.start_byte) || file.in_macro(last)
    })
}

/// Apply a list of non-overlapping edits to source code.
///
/// # Errors
///
/// Returns an error if edits overlap or any edit has an invalid range.
///
/// # Example
///
/// ```rust
/// use safe_buffers::fix::{TextEdit, apply_fixes};
///
/// let source = "int *p = q;";
/// let edits = vec![TextEdit::replace(0, 5, "std::span<int> ")];
///
/// let result = apply_fixes(source, &edits).expect("valid edits");
/// assert_eq!(result, "std::span<int> p = q;");
/// ```
pub fn apply_fixes(source: &str, edits: &[TextEdit]) -> Result<String, FixError> {
    if edits.is_empty() {
        return Ok(source.to_string());
    }

    validate_edits(edits, source.len())?;

    // Back to front; at equal offsets the later edit goes first so the
    // earlier one ends up in front of it.
    let mut ordered: Vec<(usize, &TextEdit)> = edits.iter().enumerate().collect();
    ordered.sort_by(|(ia, a), (ib, b)| b.start_byte.cmp(&a.start_byte).then(ib.cmp(ia)));

    let mut result = source.to_string();
    for (_, edit) in ordered {
        result.replace_range(edit.range(), &edit.replacement);
    }

    Ok(result)
}

/// Apply a single edit to source code (convenience wrapper).
pub fn apply_fix(source: &str, edit: &TextEdit) -> Result<String, FixError> {
    apply_fixes(source, std::slice::from_ref(edit))
}
