//! Core safe-buffers engine.
//!
//! The crate reads a typed C/C++ syntax tree exported by a compiler front
//! end, finds raw-pointer and array operations that are not bounds checked,
//! and suggests rewriting the variables involved to `std::span` or
//! `std::array`.

#![allow(clippy::too_many_arguments)] // Fix-it helpers thread the whole analysis context
#![allow(clippy::new_without_default)] // SafeBuffersEngine::new() is the documented entry point
#![allow(clippy::manual_contains)] // iter().any() reads closer to the matcher vocabulary

pub mod analysis;
pub mod ast;
pub mod category;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fix;
pub mod fixer;
pub mod fixit;
pub mod gadget;
pub mod grouping;
pub mod handler;
pub mod level;
pub mod libc;
pub mod matcher;
pub mod oracle;
pub mod strategy;
pub mod telemetry;
pub mod tracker;

use anyhow::Result;

use crate::analysis::check_unsafe_buffer_usage;
use crate::ast::TranslationUnit;
use crate::category::ReportSettings;
use crate::diagnostics::Diagnostic;
use crate::handler::DiagnosticCollector;

/// Engine runs the analysis over every callable of a translation unit.
pub struct SafeBuffersEngine {
    settings: ReportSettings,
    emit_suggestions: bool,
}

impl SafeBuffersEngine {
    /// Create a new engine with default levels and suggestions on.
    pub fn new() -> Self {
        Self {
            settings: ReportSettings::default(),
            emit_suggestions: true,
        }
    }

    /// Create a new engine with explicit settings (e.g. from config).
    pub fn new_with_settings(settings: ReportSettings, emit_suggestions: bool) -> Self {
        Self {
            settings,
            emit_suggestions,
        }
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Analyze every function, method and block with a body, in
    /// declaration order, and return the diagnostics in emission order.
    pub fn check_unit(&self, tu: &TranslationUnit) -> Result<Vec<Diagnostic>> {
        let mut collector = DiagnosticCollector::new(tu, &self.settings);
        for function in tu.callables_with_bodies() {
            check_unsafe_buffer_usage(tu, function, &mut collector, self.emit_suggestions)
                .map_err(error::SafeBuffersError::into_anyhow)?;
        }
        Ok(collector.into_diagnostics())
    }

    /// Parse a front-end export and analyze it.
    pub fn check_json(&self, json: &str) -> Result<(TranslationUnit, Vec<Diagnostic>)> {
        let tu = TranslationUnit::from_json(json).map_err(error::SafeBuffersError::into_anyhow)?;
        let diagnostics = self.check_unit(&tu)?;
        Ok((tu, diagnostics))
    }
}
