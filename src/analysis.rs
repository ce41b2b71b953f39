//! Per-callable driver: find gadgets, decide which variables can be
//! rewritten, and report everything through the handler.

use std::collections::{BTreeMap, HashMap};

use crate::ast::{CallableKind, DeclId, NodeId, Storage, SyntaxTree, TranslationUnit};
use crate::error::SafeBuffersResult;
use crate::fix::TextEdit;
use crate::fixit::{FixitContext, get_fixits};
use crate::gadget::{FixableGadget, WarningGadget};
use crate::grouping::{VariableGroups, group_variables};
use crate::handler::UnsafeBufferUsageHandler;
use crate::libc::LibcCallKind;
use crate::matcher::{MatchOptions, walk_descendants};
use crate::strategy::{FixitStrategy, naive_strategy};
use crate::tracker::DeclUseTracker;
use crate::{buffers_bail, instrument_block};

/// Gadgets found in one callable.
#[derive(Debug, Default)]
struct Findings {
    warnings: Vec<WarningGadget>,
    fixables: Vec<FixableGadget>,
    tracker: DeclUseTracker,
}

/// Body and constructor initializers of `function`, after checking it can
/// be analyzed at all.
fn analyzed_roots(tu: &TranslationUnit, function: DeclId) -> SafeBuffersResult<Vec<NodeId>> {
    let Some(fun) = tu.tree.function(function) else {
        buffers_bail!("declaration {} is not a callable", function.0);
    };
    let Some(body) = fun.body else {
        buffers_bail!("function '{}' has no body to analyze", fun.name);
    };
    let mut roots = vec![body];
    if fun.kind == CallableKind::Constructor {
        roots.extend(fun.ctor_inits.iter().copied());
    }
    Ok(roots)
}

fn find_gadgets(
    tu: &TranslationUnit,
    root: NodeId,
    handler: &dyn UnsafeBufferUsageHandler,
    emit_suggestions: bool,
    findings: &mut Findings,
) {
    let tree = &tu.tree;
    walk_descendants(tree, root, MatchOptions::WARNINGS, |id| {
        match WarningGadget::recognize(tree, tu.language, id, handler) {
            Some(gadget) => {
                findings.warnings.push(gadget);
                true
            }
            None => false,
        }
    });

    if !emit_suggestions {
        return;
    }
    let mut fixables = Vec::new();
    walk_descendants(tree, root, MatchOptions::FIXABLES, |id| {
        let before = fixables.len();
        FixableGadget::recognize_all(tree, id, &mut fixables);
        findings.tracker.observe(tree, id);
        fixables.len() > before
    });
    for gadget in &fixables {
        for dre in gadget.claimed_var_uses() {
            findings.tracker.claim_use(dre);
        }
    }
    findings.fixables.extend(fixables);
}

/// Analyzes one function, method, or block and reports its findings.
///
/// With `emit_suggestions` off, every unsafe operation is reported on its
/// own and no fixes are computed.
///
/// # Errors
///
/// Returns a precondition error when `function` is not a callable with a
/// body.
pub fn check_unsafe_buffer_usage(
    tu: &TranslationUnit,
    function: DeclId,
    handler: &mut dyn UnsafeBufferUsageHandler,
    emit_suggestions: bool,
) -> SafeBuffersResult<()> {
    let roots = analyzed_roots(tu, function)?;
    let Some(fun) = tu.tree.function(function) else {
        return Ok(());
    };
    // Lambdas in local classes are analyzed with their enclosing function.
    if fun.kind == CallableKind::LambdaOperator && fun.in_local_class {
        return Ok(());
    }
    let emit_suggestions =
        emit_suggestions && !fun.any_extern_c() && fun.kind != CallableKind::Block;

    instrument_block!("check_unsafe_buffer_usage", {
        let mut findings = Findings::default();
        for root in &roots {
            find_gadgets(tu, *root, &*handler, emit_suggestions, &mut findings);
        }
        apply_gadgets(tu, function, findings, handler, emit_suggestions);
    });
    Ok(())
}

fn apply_gadgets(
    tu: &TranslationUnit,
    function: DeclId,
    findings: Findings,
    handler: &mut dyn UnsafeBufferUsageHandler,
    emit_suggestions: bool,
) {
    let tree = &tu.tree;
    let Findings {
        warnings,
        fixables,
        tracker,
    } = findings;

    if !emit_suggestions {
        for gadget in &warnings {
            gadget.report(handler, false);
        }
        return;
    }

    let (warned_by_var, unattached) = group_warnings_by_var(tree, &warnings);
    let mut fixables_by_var = group_fixables_by_var(tree, &fixables);
    fixables_by_var.retain(|&var, _| is_fixable_var(tu, var, &tracker, handler));

    let implications: Vec<(DeclId, DeclId)> = fixables_by_var
        .values()
        .flatten()
        .filter_map(|gadget| gadget.strategy_implication(tree))
        .collect();

    let mut warned: Vec<DeclId> = warned_by_var.keys().copied().collect();
    warned.sort_by_key(|&var| (tree.var(var).map(|decl| decl.span.start), var));

    let grouping = group_variables(tree, function, &warned, &implications);
    fixables_by_var.retain(|var, _| grouping.reachable.contains(var));

    let strategy = naive_strategy(tree, fixables_by_var.keys().copied());
    let ctx = FixitContext {
        tu,
        function,
        tracker: &tracker,
        groups: &grouping.groups,
        strategy: &strategy,
    };
    let mut fixits = get_fixits(&ctx, &fixables_by_var, handler);

    for index in unattached {
        warnings[index].report(handler, false);
    }
    for var in warned {
        let edits = fixits.remove(&var).unwrap_or_default();
        handler.handle_unsafe_variable_group(var, &grouping.groups, edits, function, &strategy);
        for &index in warned_by_var.get(&var).into_iter().flatten() {
            warnings[index].report(handler, true);
        }
    }
}

/// Indices of warning gadgets per blamed variable, and of those blamed on
/// no variable.
fn group_warnings_by_var(
    tree: &SyntaxTree,
    warnings: &[WarningGadget],
) -> (BTreeMap<DeclId, Vec<usize>>, Vec<usize>) {
    let mut by_var: BTreeMap<DeclId, Vec<usize>> = BTreeMap::new();
    let mut unattached = Vec::new();
    for (index, gadget) in warnings.iter().enumerate() {
        let vars: Vec<DeclId> = gadget
            .claimed_var_uses(tree)
            .into_iter()
            .filter_map(|dre| tree.referenced_var(dre).map(|(decl, _)| decl))
            .collect();
        if vars.is_empty() {
            unattached.push(index);
            continue;
        }
        for var in vars {
            let list = by_var.entry(var).or_default();
            if !list.contains(&index) {
                list.push(index);
            }
        }
    }
    (by_var, unattached)
}

fn group_fixables_by_var(tree: &SyntaxTree, fixables: &[FixableGadget]) -> BTreeMap<DeclId, Vec<FixableGadget>> {
    let mut by_var: BTreeMap<DeclId, Vec<FixableGadget>> = BTreeMap::new();
    for gadget in fixables {
        for dre in gadget.claimed_var_uses() {
            let Some((var, _)) = tree.referenced_var(dre) else {
                continue;
            };
            let list = by_var.entry(var).or_default();
            if !list.contains(gadget) {
                list.push(gadget.clone());
            }
        }
    }
    by_var
}

/// Whether the analysis understands `var` well enough to rewrite it.
fn is_fixable_var(
    tu: &TranslationUnit,
    var: DeclId,
    tracker: &DeclUseTracker,
    handler: &mut dyn UnsafeBufferUsageHandler,
) -> bool {
    let Some(decl) = tu.tree.var(var) else {
        return false;
    };
    let fail = |handler: &mut dyn UnsafeBufferUsageHandler, offset: usize, reason: &str| {
        handler.add_debug_note_for_var(
            var,
            offset,
            &format!("failed to produce fixit for '{}' : {reason}", decl.name),
        );
    };

    if !matches!(
        decl.storage,
        Storage::Local | Storage::StaticLocal | Storage::Parameter
    ) {
        fail(handler, decl.span.start, "neither local nor a parameter");
        return false;
    }
    if decl.ty.is_reference() {
        fail(handler, decl.span.start, "has a reference type");
        return false;
    }
    if tracker.has_unclaimed_uses(var) {
        let parents = tu.tree.parent_map();
        for dre in tracker.unclaimed_uses(var) {
            let trace = ancestor_trace(&tu.tree, &parents, dre);
            fail(
                handler,
                tu.tree.span(dre).start,
                &format!("has an unclaimed use\nThe unclaimed DRE trace: {trace}"),
            );
        }
        return false;
    }
    if decl.is_init_capture {
        fail(handler, decl.span.start, "init capture");
        return false;
    }
    true
}

/// `DeclRef ==> ImplicitCast ==> Call ...`: node kinds from `id` up to the
/// outermost statement.
fn ancestor_trace(tree: &SyntaxTree, parents: &HashMap<NodeId, NodeId>, id: NodeId) -> String {
    let mut names = Vec::new();
    let mut current = Some(id);
    while let Some(node) = current {
        if let Some(kind) = tree.kind(node) {
            names.push(kind.name());
        }
        current = parents.get(&node).copied();
    }
    names.join(" ==> ")
}

/// Library calls are classified the same way the warning pass does.
#[derive(Debug, Default)]
struct SilentHandler;

impl UnsafeBufferUsageHandler for SilentHandler {
    fn handle_unsafe_operation(&mut self, _node: NodeId, _is_related_to_decl: bool) {}

    fn handle_unsafe_operation_in_container(&mut self, _node: NodeId, _is_related_to_decl: bool) {}

    fn handle_unsafe_libc_call(&mut self, _call: NodeId, _kind: LibcCallKind, _unsafe_arg: Option<NodeId>) {}

    fn handle_unsafe_variable_group(
        &mut self,
        _var: DeclId,
        _groups: &VariableGroups,
        _edits: Vec<TextEdit>,
        _function: DeclId,
        _strategy: &FixitStrategy,
    ) {
    }

    fn is_safe_buffer_opt_out(&self, _offset: usize) -> bool {
        false
    }

    fn ignore_unsafe_buffer_in_container(&self, _offset: usize) -> bool {
        false
    }

    fn ignore_unsafe_buffer_in_libc_call(&self, _offset: usize) -> bool {
        false
    }
}

/// Pointer expressions whose use makes some operation in `function`
/// unsafe. Nothing is reported.
///
/// # Errors
///
/// Returns a precondition error when `function` is not a callable with a
/// body.
pub fn find_unsafe_pointers(tu: &TranslationUnit, function: DeclId) -> SafeBuffersResult<Vec<NodeId>> {
    let roots = analyzed_roots(tu, function)?;
    let handler = SilentHandler;
    let mut findings = Findings::default();
    for root in roots {
        find_gadgets(tu, root, &handler, false, &mut findings);
    }
    let mut pointers: Vec<NodeId> = findings
        .warnings
        .iter()
        .flat_map(|gadget| gadget.unsafe_ptrs(&tu.tree))
        .collect();
    pointers.sort();
    pointers.dedup();
    Ok(pointers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{TreeBuilder, Type, UnaryOp};
    use crate::error::SafeBuffersError;

    #[test]
    fn non_callables_are_a_precondition_error() {
        let mut b = TreeBuilder::new("int *g;");
        let g = b.global("g", Type::pointer_to(Type::int()), "int *g");
        let tu = b.finish().expect("builds");
        let err = find_unsafe_pointers(&tu, g).expect_err("not a callable");
        assert!(matches!(err, SafeBuffersError::Precondition(_)));
    }

    #[test]
    fn trace_walks_up_to_the_statement() {
        let mut b = TreeBuilder::new("void f(int *p) { p++; }");
        let f = b.function("f", "void f(int *p)");
        let p = b.param(f, "p", Type::pointer_to(Type::int()), "int *p");
        let p_ref = b.var_ref_at(p, "p", 1);
        let inc = b.unary(UnaryOp::PostInc, p_ref);
        let open = b.find("{");
        let body = b.block_at(vec![inc], open);
        b.set_body(f, body);
        let tu = b.finish().expect("builds");

        let trace = ancestor_trace(&tu.tree, &tu.tree.parent_map(), p_ref);
        assert_eq!(trace, "DeclRefExpr ==> UnaryOperator ==> CompoundStmt");
        assert_eq!(find_unsafe_pointers(&tu, f).expect("analyzable"), vec![p_ref]);
    }
}
