//! End-to-end analysis of small translation units.

mod support;

use safe_buffers::SafeBuffersEngine;
use safe_buffers::analysis::{check_unsafe_buffer_usage, find_unsafe_pointers};
use safe_buffers::ast::{Decl, DeclId, Language, NodeId, TranslationUnit};
use safe_buffers::category::{FindingCategory, ReportSettings};
use safe_buffers::diagnostics::{Applicability, Diagnostic};
use safe_buffers::fix::TextEdit;
use safe_buffers::grouping::VariableGroups;
use safe_buffers::handler::{DiagnosticCollector, UnsafeBufferUsageHandler};
use safe_buffers::level::LintLevel;
use safe_buffers::libc::LibcCallKind;
use safe_buffers::strategy::FixitStrategy;
use support::render;

fn check(tu: &TranslationUnit) -> Vec<Diagnostic> {
    SafeBuffersEngine::new()
        .check_unit(tu)
        .expect("analysis should succeed")
}

fn check_with(tu: &TranslationUnit, settings: ReportSettings, emit_suggestions: bool) -> Vec<Diagnostic> {
    SafeBuffersEngine::new_with_settings(settings, emit_suggestions)
        .check_unit(tu)
        .expect("analysis should succeed")
}

/// Forwards to a [`DiagnosticCollector`] and keeps the debug notes.
struct NoteRecorder<'a> {
    inner: DiagnosticCollector<'a>,
    notes: Vec<String>,
}

impl UnsafeBufferUsageHandler for NoteRecorder<'_> {
    fn handle_unsafe_operation(&mut self, node: NodeId, is_related_to_decl: bool) {
        self.inner.handle_unsafe_operation(node, is_related_to_decl);
    }

    fn handle_unsafe_operation_in_container(&mut self, node: NodeId, is_related_to_decl: bool) {
        self.inner
            .handle_unsafe_operation_in_container(node, is_related_to_decl);
    }

    fn handle_unsafe_libc_call(&mut self, call: NodeId, kind: LibcCallKind, unsafe_arg: Option<NodeId>) {
        self.inner.handle_unsafe_libc_call(call, kind, unsafe_arg);
    }

    fn handle_unsafe_variable_group(
        &mut self,
        var: DeclId,
        groups: &VariableGroups,
        edits: Vec<TextEdit>,
        function: DeclId,
        strategy: &FixitStrategy,
    ) {
        self.inner
            .handle_unsafe_variable_group(var, groups, edits, function, strategy);
    }

    fn is_safe_buffer_opt_out(&self, offset: usize) -> bool {
        self.inner.is_safe_buffer_opt_out(offset)
    }

    fn ignore_unsafe_buffer_in_container(&self, offset: usize) -> bool {
        self.inner.ignore_unsafe_buffer_in_container(offset)
    }

    fn ignore_unsafe_buffer_in_libc_call(&self, offset: usize) -> bool {
        self.inner.ignore_unsafe_buffer_in_libc_call(offset)
    }

    fn add_debug_note_for_var(&mut self, _var: DeclId, _offset: usize, note: &str) {
        self.notes.push(note.to_string());
    }
}

#[test]
fn local_buffer_gets_a_span_suggestion() {
    let scenario = support::local_buffer();
    let diags = check(&scenario.tu);

    insta::assert_snapshot!(render(&diags), @r"
2:8: warning: unsafe_variable: 'p' is an unsafe pointer used for buffer access
  2:8: note: change type of 'p' to 'std::span' to preserve bounds information
  3:11: note: used in buffer access here
");
    let suggestion = diags[0].suggestion.as_ref().expect("p is fixable");
    assert_eq!(suggestion.applicability, Applicability::MachineApplicable);
}

#[test]
fn group_mates_are_named_in_each_note() {
    let scenario = support::assigned_pair();
    let diags = check(&scenario.tu);

    insta::assert_snapshot!(render(&diags), @r"
2:8: warning: unsafe_variable: 'p' is an unsafe pointer used for buffer access
  2:8: note: change type of 'p' to 'std::span' to preserve bounds information, and change 'q' to 'std::span' to propagate bounds information between them
  4:3: note: used in buffer access here
3:8: warning: unsafe_variable: 'q' is an unsafe pointer used for buffer access
  3:8: note: change type of 'q' to 'std::span' to preserve bounds information, and change 'p' to 'std::span' to propagate bounds information between them
  5:3: note: used in buffer access here
");

    let edits: Vec<&Vec<TextEdit>> = diags
        .iter()
        .map(|d| &d.suggestion.as_ref().expect("both are fixable").edits)
        .collect();
    assert_eq!(edits[0], edits[1], "group mates share one edit set");
}

#[test]
fn unclaimed_use_withholds_the_fix() {
    let scenario = support::arithmetic_escape();
    let settings = ReportSettings::default();
    let mut recorder = NoteRecorder {
        inner: DiagnosticCollector::new(&scenario.tu, &settings),
        notes: Vec::new(),
    };
    check_unsafe_buffer_usage(&scenario.tu, scenario.function, &mut recorder, true)
        .expect("analysis should succeed");
    let diags = recorder.inner.into_diagnostics();

    insta::assert_snapshot!(render(&diags), @r"
1:13: warning: unsafe_variable: 'p' is an unsafe pointer used for buffer access
  2:12: note: used in pointer arithmetic here
  3:11: note: used in buffer access here
");
    assert!(diags[0].suggestion.is_none());
    assert_eq!(
        recorder.notes,
        vec![
            "failed to produce fixit for 'p' : has an unclaimed use\n\
             The unclaimed DRE trace: DeclRefExpr ==> ImplicitCastExpr ==> BinaryOperator ==> DeclStmt ==> CompoundStmt"
                .to_string()
        ]
    );
}

#[test]
fn local_array_gets_a_std_array_suggestion() {
    let scenario = support::local_array();
    let diags = check(&scenario.tu);

    insta::assert_snapshot!(render(&diags), @r"
2:7: warning: unsafe_variable: 'arr' is an unsafe buffer that does not perform bounds checks
  2:7: note: change type of 'arr' to 'std::array' to label it for hardening
  3:3: note: used in buffer access here
");
    let suggestion = diags[0].suggestion.as_ref().expect("arr is fixable");
    assert_eq!(suggestion.applicability, Applicability::MachineApplicable);
    assert_eq!(suggestion.edits.len(), 1);
    assert_eq!(suggestion.edits[0].replacement, "std::array<int, 10> arr");
}

#[test]
fn array_size_with_its_own_subscript_is_kept_whole() {
    let scenario = support::sizeof_sized_array();
    let diags = check(&scenario.tu);

    insta::assert_snapshot!(render(&diags), @r"
3:7: warning: unsafe_variable: 'arr' is an unsafe buffer that does not perform bounds checks
  3:7: note: change type of 'arr' to 'std::array' to label it for hardening
  4:3: note: used in buffer access here
");
    let suggestion = diags[0].suggestion.as_ref().expect("arr is fixable");
    assert_eq!(suggestion.edits[0].replacement, "std::array<int, sizeof(g[0])> arr");
}

#[test]
fn clashing_group_edits_drop_the_whole_group() {
    let scenario = support::clashing_pair();
    let settings = ReportSettings::default();
    let mut recorder = NoteRecorder {
        inner: DiagnosticCollector::new(&scenario.tu, &settings),
        notes: Vec::new(),
    };
    check_unsafe_buffer_usage(&scenario.tu, scenario.function, &mut recorder, true)
        .expect("analysis should succeed");
    let diags = recorder.inner.into_diagnostics();

    insta::assert_snapshot!(render(&diags), @r"
2:13: warning: unsafe_variable: 'p' is an unsafe pointer used for buffer access
  4:3: note: used in pointer arithmetic here
  5:3: note: used in buffer access here
3:13: warning: unsafe_variable: 'q' is an unsafe pointer used for buffer access
  6:3: note: used in buffer access here
");
    assert!(diags.iter().all(|d| d.suggestion.is_none()));
    // every variable and use could be rewritten on its own
    assert!(recorder.notes.is_empty(), "{:?}", recorder.notes);
}

#[test]
fn empty_span_construction_is_safe() {
    let scenario = support::span_from_pointer();
    let diags = check(&scenario.tu);

    insta::assert_snapshot!(render(&diags), @"3:3: warning: unsafe_container: the two-parameter std::span construction is unsafe as it can introduce mismatch between buffer size and the bound information");
    assert_eq!(diags[0].category, FindingCategory::UnsafeContainer);
}

#[test]
fn sprintf_is_reported_without_a_suggestion() {
    let scenario = support::formatted_write();
    let diags = check(&scenario.tu);

    insta::assert_snapshot!(render(&diags), @r"
2:3: warning: unsafe_libc_call: function 'sprintf' is unsafe
  2:3: note: change to 'snprintf' for explicit bounds checking
");
    assert_eq!(diags[0].category, FindingCategory::UnsafeLibcCall);
    assert!(diags[0].suggestion.is_none());
}

#[test]
fn operations_without_a_variable_come_first() {
    let scenario = support::indexed_then_copied();
    let diags = check(&scenario.tu);

    insta::assert_snapshot!(render(&diags), @r"
3:3: warning: unsafe_libc_call: function 'strcpy' is unsafe
1:13: warning: unsafe_variable: 'p' is an unsafe pointer used for buffer access
  1:13: note: change type of 'p' to 'std::span' to preserve bounds information
  2:3: note: used in buffer access here
");
}

#[test]
fn macro_expanded_initializers_are_not_rewritten() {
    let scenario = support::local_buffer_with(|b| {
        let alloc = b.find("new int[10]");
        b.macro_expansion(alloc);
    });
    let diags = check(&scenario.tu);

    insta::assert_snapshot!(render(&diags), @r"
2:8: warning: unsafe_variable: 'p' is an unsafe pointer used for buffer access
  3:11: note: used in buffer access here
");
    assert!(diags[0].suggestion.is_none());
}

#[test]
fn without_suggestions_operations_stand_alone() {
    let scenario = support::local_buffer();
    let diags = check_with(&scenario.tu, ReportSettings::default(), false);

    insta::assert_snapshot!(render(&diags), @"3:11: warning: unsafe_operation: unsafe buffer access");
}

#[test]
fn extern_c_functions_get_no_suggestions() {
    let mut scenario = support::local_buffer();
    let Some(Decl::Function(fun)) = scenario.tu.tree.decls.get_mut(scenario.function.index()) else {
        panic!("f is a function");
    };
    fun.is_extern_c = true;
    let diags = check(&scenario.tu);

    insta::assert_snapshot!(render(&diags), @"3:11: warning: unsafe_operation: unsafe buffer access");
}

#[test]
fn allowed_variable_findings_leave_operations_reported() {
    let scenario = support::local_buffer();
    let settings = ReportSettings::default().with_level(FindingCategory::UnsafeVariable, LintLevel::Allow);
    let diags = check_with(&scenario.tu, settings, true);

    insta::assert_snapshot!(render(&diags), @"3:11: warning: unsafe_operation: unsafe buffer access");
}

#[test]
fn opt_out_regions_silence_findings() {
    let scenario = support::local_buffer_with(|b| {
        let access = b.find("p[5]");
        b.opt_out_region(access);
    });
    assert!(check(&scenario.tu).is_empty());
}

#[test]
fn unbounded_libc_copies_are_reported() {
    let scenario = support::libc_copy(|_| {});
    let diags = check(&scenario.tu);

    insta::assert_snapshot!(render(&diags), @"2:3: warning: unsafe_libc_call: function 'strcpy' is unsafe");
}

#[test]
fn libc_calls_are_not_checked_in_c() {
    let scenario = support::libc_copy(|b| b.set_language(Language::C));
    assert!(check(&scenario.tu).is_empty());
}

#[test]
fn config_levels_apply_to_findings() {
    let scenario = support::libc_copy(|_| {});
    let settings = ReportSettings::default().with_level(FindingCategory::UnsafeLibcCall, LintLevel::Error);
    let diags = check_with(&scenario.tu, settings, true);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].level, LintLevel::Error);

    let settings = ReportSettings::default().with_level(FindingCategory::UnsafeLibcCall, LintLevel::Allow);
    assert!(check_with(&scenario.tu, settings, true).is_empty());
}

#[test]
fn unsafe_pointers_are_listed_without_reporting() {
    let scenario = support::local_buffer();
    let pointers = find_unsafe_pointers(&scenario.tu, scenario.function).expect("f has a body");
    assert_eq!(pointers, vec![scenario.nodes[0]]);
}

#[test]
fn results_are_deterministic() {
    let scenario = support::assigned_pair();
    let first = serde_json::to_string(&check(&scenario.tu)).expect("serializes");
    let second = serde_json::to_string(&check(&scenario.tu)).expect("serializes");
    assert_eq!(first, second);
}

#[test]
fn exported_units_analyze_like_built_ones() {
    let scenario = support::assigned_pair();
    let direct = serde_json::to_string(&check(&scenario.tu)).expect("serializes");

    let json = serde_json::to_string(&scenario.tu).expect("serializes");
    let (tu, diags) = SafeBuffersEngine::new()
        .check_json(&json)
        .expect("export loads");
    assert_eq!(tu.file.text, support::ASSIGNED_PAIR);
    assert_eq!(serde_json::to_string(&diags).expect("serializes"), direct);
}

#[test]
fn malformed_exports_are_rejected() {
    let err = SafeBuffersEngine::new()
        .check_json("{\"file\": {\"text\": \"\"}, \"nodes\": [{]}")
        .expect_err("not json");
    assert!(!err.to_string().is_empty());
}
