use crate::ast::Language;
use crate::category::ReportSettings;
use crate::level::LintLevel;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct SafeBuffersConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub levels: LevelsConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    /// Compute fix suggestions for unsafe variables.
    #[serde(default = "default_emit_suggestions")]
    pub emit_suggestions: bool,

    /// Overrides the language recorded in each exported unit.
    #[serde(default)]
    pub language: Option<Language>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            emit_suggestions: default_emit_suggestions(),
            language: None,
        }
    }
}

fn default_emit_suggestions() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct LevelsConfig {
    #[serde(default)]
    pub disabled: Vec<String>,

    #[serde(flatten)]
    pub levels: HashMap<String, LintLevel>,
}

impl SafeBuffersConfig {
    /// Category levels from `[levels]`; unknown category names are errors.
    pub fn report_settings(&self) -> Result<ReportSettings> {
        let settings = ReportSettings::default()
            .with_config_levels(self.levels.levels.clone())?
            .disable(self.levels.disabled.iter().cloned())?;
        Ok(settings)
    }
}

pub const DEFAULT_CONFIG_FILE_NAME: &str = "safe-buffers.toml";

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut cur = Some(start_dir);
    while let Some(dir) = cur {
        let candidate = dir.join(DEFAULT_CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        cur = dir.parent();
    }
    None
}

pub fn load_config_file(path: &Path) -> Result<SafeBuffersConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let cfg: SafeBuffersConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(cfg)
}

pub fn load_config(
    explicit_path: Option<&Path>,
    start_dir: &Path,
) -> Result<Option<(PathBuf, SafeBuffersConfig)>> {
    if let Some(p) = explicit_path {
        let cfg = load_config_file(p)?;
        return Ok(Some((p.to_path_buf(), cfg)));
    }

    let Some(p) = find_config_file(start_dir) else {
        return Ok(None);
    };
    let cfg = load_config_file(&p)?;
    Ok(Some((p, cfg)))
}
