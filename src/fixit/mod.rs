//! Turns the fixable gadgets of each variable into one edit set per
//! variable group.
//!
//! A variable keeps its edits only when its declaration and every one of
//! its uses can be rewritten, when the same holds for the rest of its
//! group, and when the merged edits neither touch a macro expansion nor
//! conflict with each other.

pub mod decl;
pub mod overloads;

use std::collections::BTreeMap;

use crate::ast::{CallableKind, DeclId, TranslationUnit};
use crate::debug_note;
use crate::fix::{TextEdit, any_conflict, touches_macro};
use crate::gadget::FixableGadget;
use crate::grouping::VariableGroups;
use crate::handler::UnsafeBufferUsageHandler;
use crate::strategy::FixitStrategy;
use crate::tracker::DeclUseTracker;

pub use decl::fix_variable;
pub use overloads::create_overloads_for_fixed_params;

/// `<# hint #>`: text the user has to fill in by hand.
pub fn user_fill_placeholder(hint: &str) -> String {
    format!("<# {hint} #>")
}

/// Everything the synthesis needs about the function under analysis.
pub struct FixitContext<'a> {
    pub tu: &'a TranslationUnit,
    pub function: DeclId,
    pub tracker: &'a DeclUseTracker,
    pub groups: &'a VariableGroups,
    pub strategy: &'a FixitStrategy,
}

/// Final edit set per variable; variables without an entry get none.
pub fn get_fixits(
    ctx: &FixitContext<'_>,
    fixables: &BTreeMap<DeclId, Vec<FixableGadget>>,
    handler: &mut dyn UnsafeBufferUsageHandler,
) -> BTreeMap<DeclId, Vec<TextEdit>> {
    let mut per_var: BTreeMap<DeclId, Vec<TextEdit>> = BTreeMap::new();
    'vars: for (&var, gadgets) in fixables {
        let mut edits = fix_variable(
            ctx.tu,
            var,
            ctx.strategy.lookup(var),
            ctx.function,
            ctx.tracker,
            handler,
        );
        if edits.is_empty() {
            continue;
        }
        for gadget in gadgets {
            match gadget.fixits(ctx.tu, ctx.strategy) {
                Some(gadget_edits) => edits.extend(gadget_edits),
                None => {
                    let offset = ctx.tu.tree.span(gadget.anchor()).start;
                    handler.add_debug_note_for_var(
                        var,
                        offset,
                        &format!("gadget '{}' refused to produce a fix", gadget.name()),
                    );
                    continue 'vars;
                }
            }
        }
        per_var.insert(var, edits);
    }

    erase_vars_for_unfixable_group_mates(&mut per_var, ctx.groups);

    let shared_by_params = overloads_for_params(ctx, &mut per_var, handler);

    let mut merged: BTreeMap<DeclId, Vec<TextEdit>> = BTreeMap::new();
    for (&var, own) in &per_var {
        let (group, in_params) = ctx.groups.group_of_var(var);
        let mut edits = own.clone();
        for mate in group {
            if *mate == var {
                continue;
            }
            if let Some(mate_edits) = per_var.get(mate) {
                edits.extend(mate_edits.iter().cloned());
            }
        }
        if in_params {
            edits.extend(shared_by_params.iter().cloned());
        }
        edits.sort();
        merged.insert(var, edits);
    }

    merged.retain(|var, edits| {
        let keep = !touches_macro(edits, &ctx.tu.file) && !any_conflict(edits);
        if !keep {
            debug_note!("dropping the fixes of variable {:?}: macro or conflicting edits", var);
        }
        keep
    });
    merged
}

/// Drops every variable whose group lost a member.
fn erase_vars_for_unfixable_group_mates(per_var: &mut BTreeMap<DeclId, Vec<TextEdit>>, groups: &VariableGroups) {
    let doomed: Vec<DeclId> = per_var
        .keys()
        .filter(|&&var| {
            groups
                .group_of_var(var)
                .0
                .iter()
                .any(|mate| !per_var.contains_key(mate))
        })
        .copied()
        .collect();
    for var in doomed {
        for mate in groups.group_of_var(var).0 {
            per_var.remove(mate);
        }
    }
}

/// Overload edits shared by the parameter group. When they cannot be
/// written the whole parameter group is dropped.
fn overloads_for_params(
    ctx: &FixitContext<'_>,
    per_var: &mut BTreeMap<DeclId, Vec<TextEdit>>,
    handler: &dyn UnsafeBufferUsageHandler,
) -> Vec<TextEdit> {
    let is_function = ctx
        .tu
        .tree
        .function(ctx.function)
        .is_some_and(|fun| fun.kind != CallableKind::Block);
    if !is_function {
        return Vec::new();
    }
    match create_overloads_for_fixed_params(ctx.tu, ctx.function, ctx.strategy, handler) {
        Some(edits) => edits,
        None => {
            for member in ctx.groups.group_of_params() {
                per_var.remove(member);
            }
            Vec::new()
        }
    }
}
