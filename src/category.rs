//! Finding categories and their configured levels.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{SafeBuffersError, SafeBuffersResult};
use crate::level::LintLevel;

/// What kind of finding a diagnostic reports. Each category has its own
/// level in `safe-buffers.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    UnsafeOperation,
    UnsafeContainer,
    UnsafeLibcCall,
    UnsafeVariable,
}

impl FindingCategory {
    pub const ALL: [FindingCategory; 4] = [
        FindingCategory::UnsafeOperation,
        FindingCategory::UnsafeContainer,
        FindingCategory::UnsafeLibcCall,
        FindingCategory::UnsafeVariable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FindingCategory::UnsafeOperation => "unsafe_operation",
            FindingCategory::UnsafeContainer => "unsafe_container",
            FindingCategory::UnsafeLibcCall => "unsafe_libc_call",
            FindingCategory::UnsafeVariable => "unsafe_variable",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FindingCategory::UnsafeOperation => {
                "Pointer arithmetic, unchecked subscripts and calls marked unsafe_buffer_usage"
            }
            FindingCategory::UnsafeContainer => {
                "Two-argument std::span constructions whose size cannot be checked"
            }
            FindingCategory::UnsafeLibcCall => {
                "C library calls that read or write buffers without bounds"
            }
            FindingCategory::UnsafeVariable => {
                "Variables used as unchecked buffers, with suggested safe types"
            }
        }
    }

    /// Accepts the snake_case name or its kebab-case spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        let canonical = name.replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == canonical)
    }
}

/// Per-category levels; categories without an entry are at `warn`.
#[derive(Debug, Clone, Default)]
pub struct ReportSettings {
    levels: HashMap<FindingCategory, LintLevel>,
}

impl ReportSettings {
    pub fn with_config_levels(mut self, levels: HashMap<String, LintLevel>) -> SafeBuffersResult<Self> {
        for (name, level) in levels {
            let category = Self::resolve(&name)?;
            self.levels.insert(category, level);
        }
        Ok(self)
    }

    pub fn disable(mut self, disabled: impl IntoIterator<Item = String>) -> SafeBuffersResult<Self> {
        for name in disabled {
            let category = Self::resolve(&name)?;
            self.levels.insert(category, LintLevel::Allow);
        }
        Ok(self)
    }

    #[must_use]
    pub fn with_level(mut self, category: FindingCategory, level: LintLevel) -> Self {
        self.levels.insert(category, level);
        self
    }

    pub fn level_for(&self, category: FindingCategory) -> LintLevel {
        self.levels.get(&category).copied().unwrap_or_default()
    }

    fn resolve(name: &str) -> SafeBuffersResult<FindingCategory> {
        FindingCategory::from_name(name)
            .ok_or_else(|| SafeBuffersError::config(format!("unknown finding category `{name}`")))
    }
}
