use serde::Serialize;

use crate::ast::{SourceFile, Span};
use crate::category::FindingCategory;
use crate::fix::TextEdit;
use crate::level::LintLevel;

/// A single finding produced by the analysis.
#[derive(Debug, Clone, Serialize)]
#[must_use]
pub struct Diagnostic {
    pub category: FindingCategory,
    pub level: LintLevel,
    pub file: String,
    pub span: Span,
    pub location: Position,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Suggestion>,
}

/// Secondary message attached to a diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub span: Span,
    pub location: Position,
    pub message: String,
}

/// Edit set that rewrites a variable group to safe types.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub message: String,
    pub edits: Vec<TextEdit>,
    pub applicability: Applicability,
}

/// Applicability of an automated suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Applicability {
    MachineApplicable,
    /// Contains `<# ... #>` text that must be filled in by hand.
    HasPlaceholders,
}

impl Applicability {
    pub fn of(edits: &[TextEdit]) -> Self {
        if edits.iter().any(|edit| edit.replacement.contains("<#")) {
            Applicability::HasPlaceholders
        } else {
            Applicability::MachineApplicable
        }
    }
}

/// Single position in a source file (1-based row/column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub fn at(file: &SourceFile, offset: usize) -> Self {
        let (row, column) = file.line_col(offset);
        Self { row, column }
    }
}

impl Note {
    pub fn new(file: &SourceFile, span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            location: Position::at(file, span.start),
            message: message.into(),
        }
    }
}
