mod support;

use safe_buffers::SafeBuffersEngine;
use safe_buffers::category::FindingCategory;
use safe_buffers::config;
use safe_buffers::level::LintLevel;

fn engine_from(toml: &str) -> SafeBuffersEngine {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(config::DEFAULT_CONFIG_FILE_NAME);
    std::fs::write(&path, toml).expect("write config");
    let cfg = config::load_config_file(&path).expect("config should load");
    let settings = cfg.report_settings().expect("known categories");
    SafeBuffersEngine::new_with_settings(settings, cfg.analysis.emit_suggestions)
}

#[test]
fn config_can_promote_category_to_error() {
    let engine = engine_from("[levels]\nunsafe_libc_call = \"error\"\n");
    let scenario = support::libc_copy(|_| {});
    let diags = engine.check_unit(&scenario.tu).expect("analysis should succeed");

    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].category, FindingCategory::UnsafeLibcCall);
    assert_eq!(diags[0].level, LintLevel::Error);
}

#[test]
fn disabled_categories_are_not_reported() {
    let engine = engine_from("[levels]\ndisabled = [\"unsafe-libc-call\"]\n");
    let scenario = support::libc_copy(|_| {});
    assert!(engine.check_unit(&scenario.tu).expect("analysis should succeed").is_empty());
}

#[test]
fn suggestions_can_be_switched_off() {
    let engine = engine_from("[analysis]\nemit_suggestions = false\n");
    let scenario = support::local_buffer();
    let diags = engine.check_unit(&scenario.tu).expect("analysis should succeed");

    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].category, FindingCategory::UnsafeOperation);
    assert!(diags.iter().all(|d| d.suggestion.is_none()));
}

#[test]
fn unknown_categories_fail_to_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(config::DEFAULT_CONFIG_FILE_NAME);
    std::fs::write(&path, "[levels]\nunsafe_everything = \"warn\"\n").expect("write config");
    let cfg = config::load_config_file(&path).expect("config should parse");
    let err = cfg.report_settings().expect_err("unknown category");
    assert!(format!("{err:#}").contains("unsafe_everything"));
}
