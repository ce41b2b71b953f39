//! Keeps a function callable with its old signature once parameters change.
//!
//! Every prior declaration is marked unsafe and followed by a declaration
//! of the new signature; the definition is followed by an old-signature
//! definition forwarding to the new one.

use crate::ast::{DeclId, FunctionDecl, ParamSite, Span, TranslationUnit};
use crate::fix::TextEdit;
use crate::handler::UnsafeBufferUsageHandler;
use crate::strategy::{FixitStrategy, StrategyKind};

use super::decl::{pointee_type_text, span_type_text};
use super::user_fill_placeholder;

/// New type text per parameter; `None` for parameters that keep theirs.
type ParamMask = Vec<Option<String>>;

/// Edits shared by every parameter of `function`. `Some(empty)` when no
/// parameter is rewritten; `None` when the overloads cannot be written.
pub fn create_overloads_for_fixed_params(
    tu: &TranslationUnit,
    function: DeclId,
    strategy: &FixitStrategy,
    handler: &dyn UnsafeBufferUsageHandler,
) -> Option<Vec<TextEdit>> {
    let fun = tu.tree.function(function)?;
    if fun.has_overloads {
        return None;
    }

    let mut mask: ParamMask = Vec::with_capacity(fun.params.len());
    for &param in &fun.params {
        match strategy.lookup(param) {
            StrategyKind::Wontfix => mask.push(None),
            StrategyKind::Span => {
                let var = tu.tree.var(param)?;
                let (element, element_const) = pointee_type_text(tu, var)?;
                mask.push(Some(span_type_text(&element, element_const)));
            }
            _ => return None,
        }
    }
    if mask.iter().all(Option::is_none) {
        return Some(Vec::new());
    }

    let mut edits = Vec::new();
    for redecl in &fun.redecls {
        if !redecl.unsafe_buffer_usage {
            edits.push(TextEdit::insert(
                redecl.span.start,
                handler.unsafe_buffer_usage_attribute_text(redecl.span.start, " "),
            ));
        }
        let declaration = new_signature_declaration(tu, redecl.span, &redecl.params, &mask)?;
        edits.push(TextEdit::insert(redecl.span.end, declaration));
    }

    if fun.body.is_some() {
        let definition = old_signature_definition(tu, fun, &mask, handler)?;
        edits.push(TextEdit::insert(fun.span.end, definition));
    }
    Some(edits)
}

/// `;\nvoid f(std::span<int> p, int n)`, closed by the `;` of the prior
/// declaration it follows.
fn new_signature_declaration(
    tu: &TranslationUnit,
    header: Span,
    params: &[ParamSite],
    mask: &ParamMask,
) -> Option<String> {
    if params.len() != mask.len() {
        return None;
    }
    let prefix_end = match params.first() {
        Some(first) => first.span.start,
        None => return None,
    };
    let prefix = tu.text(Span::new(header.start, prefix_end));

    let rendered: Vec<String> = params
        .iter()
        .zip(mask)
        .map(|(site, new_ty)| match (new_ty, &site.name) {
            (Some(ty), Some(name)) => format!("{ty} {name}"),
            (Some(ty), None) => ty.clone(),
            (None, _) => tu.text(site.span).to_string(),
        })
        .collect();
    Some(format!(";\n{prefix}{})", rendered.join(", ")))
}

/// Old-signature definition calling the new one.
fn old_signature_definition(
    tu: &TranslationUnit,
    fun: &FunctionDecl,
    mask: &ParamMask,
    handler: &dyn UnsafeBufferUsageHandler,
) -> Option<String> {
    let body = fun.body?;
    let header = tu.text(Span::new(fun.span.start, tu.tree.span(body).start));

    let mut args = Vec::with_capacity(fun.params.len());
    for (&param, new_ty) in fun.params.iter().zip(mask) {
        let var = tu.tree.var(param)?;
        if var.name.is_empty() {
            return None;
        }
        match new_ty {
            Some(ty) => args.push(format!(
                "{ty}({}, {})",
                var.name,
                user_fill_placeholder("size")
            )),
            None => args.push(var.name.clone()),
        }
    }

    Some(format!(
        "\n{}{header}{{return {}({});}}\n",
        handler.unsafe_buffer_usage_attribute_text(fun.span.start, " "),
        fun.name,
        args.join(", ")
    ))
}
