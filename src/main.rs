use anyhow::Context;
use clap::Parser;
use safe_buffers::SafeBuffersEngine;
use safe_buffers::ast::{Language, TranslationUnit};
use safe_buffers::category::{FindingCategory, ReportSettings};
use safe_buffers::cli::{Args, CheckArgs, Command, OutputFormat};
use safe_buffers::config;
use safe_buffers::diagnostics::Diagnostic;
use safe_buffers::fixer;
use safe_buffers::level::LintLevel;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use walkdir::WalkDir;

fn main() -> ExitCode {
    safe_buffers::telemetry::init_tracing();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    match args.command {
        Some(Command::Categories) => {
            list_categories();
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Check(check)) => check_command(check),
        None => check_command(args.check),
    }
}

fn list_categories() {
    for category in FindingCategory::ALL {
        println!("{}\t{}", category.as_str(), category.description());
    }
}

/// One analyzed export.
struct Report {
    export: PathBuf,
    unit: TranslationUnit,
    diagnostics: Vec<Diagnostic>,
}

fn check_command(args: CheckArgs) -> anyhow::Result<ExitCode> {
    if args.paths.is_empty() {
        anyhow::bail!("no input: pass one or more syntax-tree exports (*.json)");
    }

    let start_dir = infer_start_dir(&args.paths)?;
    let loaded_cfg = config::load_config(args.config.as_deref(), &start_dir)?;

    let (settings, emit_suggestions, language) = match loaded_cfg.as_ref() {
        Some((path, cfg)) => (
            cfg.report_settings()
                .with_context(|| format!("invalid config file: {}", path.display()))?,
            cfg.analysis.emit_suggestions,
            cfg.analysis.language,
        ),
        None => (ReportSettings::default(), true, None),
    };
    // CLI flags take precedence over config
    let emit_suggestions = emit_suggestions && !args.no_suggestions;
    let language: Option<Language> = args.language.map(Language::from).or(language);

    let engine = SafeBuffersEngine::new_with_settings(settings, emit_suggestions);

    let mut reports = Vec::new();
    for export in collect_exports(&args.paths)? {
        let json = std::fs::read_to_string(&export)
            .with_context(|| format!("failed to read {}", export.display()))?;
        let mut unit = TranslationUnit::from_json(&json)
            .with_context(|| format!("failed to load syntax tree export {}", export.display()))?;
        if let Some(language) = language {
            unit.language = language;
        }
        let diagnostics = engine
            .check_unit(&unit)
            .with_context(|| format!("analysis of {} failed", export.display()))?;
        reports.push(Report {
            export,
            unit,
            diagnostics,
        });
    }

    print_reports(&reports, args.format, args.deny_warnings)?;

    if args.fix {
        fix_command(&reports, &args)?;
    }

    let total_diags: usize = reports.iter().map(|r| r.diagnostics.len()).sum();
    let has_error = reports
        .iter()
        .flat_map(|r| &r.diagnostics)
        .any(|d| d.level == LintLevel::Error);

    if has_error || (args.deny_warnings && total_diags > 0) {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_reports(reports: &[Report], format: OutputFormat, deny_warnings: bool) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let all: Vec<&Diagnostic> = reports.iter().flat_map(|r| &r.diagnostics).collect();
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
        OutputFormat::Pretty => {
            for diag in reports.iter().flat_map(|r| &r.diagnostics) {
                println!(
                    "{}:{}:{}: {}: {}: {}",
                    diag.file,
                    diag.location.row,
                    diag.location.column,
                    diag.level.as_str(),
                    diag.category.as_str(),
                    diag.message
                );
                for note in &diag.notes {
                    println!(
                        "  {}:{}:{}: note: {}",
                        diag.file, note.location.row, note.location.column, note.message
                    );
                }
            }
        }
        OutputFormat::Github => {
            for diag in reports.iter().flat_map(|r| &r.diagnostics) {
                let kind = if diag.level == LintLevel::Error
                    || (deny_warnings && diag.level == LintLevel::Warn)
                {
                    "error"
                } else {
                    "warning"
                };
                println!(
                    "::{} file={},line={},col={},title={}::{}",
                    kind,
                    github_escape(&diag.file),
                    diag.location.row,
                    diag.location.column,
                    diag.category.as_str(),
                    github_escape(&diag.message)
                );
            }
        }
    }
    Ok(())
}

/// Handle --fix: apply the suggested edit sets to the analyzed sources.
fn fix_command(reports: &[Report], args: &CheckArgs) -> anyhow::Result<()> {
    let mut total_fixed = 0usize;
    let mut total_skipped = 0usize;
    let mut files_modified = 0usize;

    for report in reports {
        if report.diagnostics.iter().all(|d| d.suggestion.is_none()) {
            continue;
        }
        let source_path = resolve_source(&report.export, &report.unit.file.path);
        let on_disk = std::fs::read_to_string(&source_path)
            .with_context(|| format!("failed to read {}", source_path.display()))?;
        fixer::ensure_fresh(&source_path, &report.unit.file.text, &on_disk)?;

        let result = fixer::apply_suggestions(&on_disk, &report.diagnostics, args.allow_placeholders)
            .with_context(|| format!("failed to apply fixes to {}", source_path.display()))?;
        total_skipped += result.fixes_skipped;
        if result.fixes_applied == 0 {
            continue;
        }
        total_fixed += result.fixes_applied;

        if args.diff {
            let diff = fixer::format_diff(&on_disk, &result.fixed_source, &source_path);
            if !diff.is_empty() {
                println!("{diff}");
            }
        } else {
            std::fs::write(&source_path, &result.fixed_source)
                .with_context(|| format!("failed to write {}", source_path.display()))?;
            files_modified += 1;
        }
    }

    if args.diff {
        eprintln!("{total_fixed} fix(es) would be applied");
    } else {
        eprintln!("Applied {total_fixed} fix(es) to {files_modified} file(s)");
    }
    if total_skipped > 0 {
        eprintln!("{total_skipped} fix(es) skipped (conflicting, or use --allow-placeholders)");
    }
    Ok(())
}

/// Source paths recorded in an export are taken relative to the export
/// when they do not exist as given.
fn resolve_source(export: &Path, recorded: &str) -> PathBuf {
    let recorded = PathBuf::from(recorded);
    if recorded.is_absolute() || recorded.exists() {
        return recorded;
    }
    match export.parent() {
        Some(dir) => dir.join(recorded),
        None => recorded,
    }
}

fn github_escape(s: &str) -> String {
    s.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn collect_exports(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in paths {
        let meta = std::fs::metadata(path)
            .with_context(|| format!("cannot access {}", path.display()))?;
        if !meta.is_dir() {
            out.push(path.clone());
            continue;
        }
        let walker = WalkDir::new(path)
            .into_iter()
            .filter_entry(|entry| !(entry.file_type().is_dir() && should_skip_dir(entry.path())));
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|e| e.to_str()) == Some("json")
            {
                out.push(entry.into_path());
            }
        }
    }

    out.sort();
    out.dedup();
    Ok(out)
}

fn should_skip_dir(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
        return false;
    };

    matches!(name, ".git" | "target")
}

fn infer_start_dir(paths: &[PathBuf]) -> anyhow::Result<PathBuf> {
    let base = match paths.first() {
        Some(p) => p.clone(),
        None => std::env::current_dir()?,
    };

    let base = if base.is_file() {
        base.parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        base
    };

    Ok(base)
}
