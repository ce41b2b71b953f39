use serde::{Deserialize, Serialize};

/// Severity of a finding category. Ordered from quietest to loudest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LintLevel {
    Allow,
    Warn,
    Error,
}

impl LintLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LintLevel::Allow => "allow",
            LintLevel::Warn => "warning",
            LintLevel::Error => "error",
        }
    }

    pub fn is_allowed(&self) -> bool {
        *self == LintLevel::Allow
    }
}

impl Default for LintLevel {
    fn default() -> Self {
        Self::Warn
    }
}
