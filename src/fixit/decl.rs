//! Rewrites of variable declarations to their bounds-carrying type.
//!
//! Every function returns the edits for one declaration; an empty list
//! means the declaration cannot be rewritten and the variable is dropped.

use crate::ast::eval::{has_side_effects, is_null_pointer_constant};
use crate::ast::{DeclId, NodeId, NodeKind, Span, Storage, TranslationUnit, UnaryOp, VarDecl};
use crate::fix::TextEdit;
use crate::handler::UnsafeBufferUsageHandler;
use crate::strategy::StrategyKind;
use crate::tracker::DeclUseTracker;

use super::user_fill_placeholder;

fn decl_fail(handler: &mut dyn UnsafeBufferUsageHandler, id: DeclId, var: &VarDecl, reason: &str) {
    handler.add_debug_note_for_var(
        id,
        var.span.start,
        &format!("failed to produce fixit for declaration '{}'{reason}", var.name),
    );
}

/// Specifiers and storage the rewrites do not know how to carry over.
pub fn has_unsupported_specifiers(var: &VarDecl) -> bool {
    let local_storage = matches!(var.storage, Storage::Local | Storage::Parameter);
    let attr_inside = var.attrs.iter().any(|attr| attr.end > var.span.start);
    var.is_inline || var.is_constexpr || var.has_constant_init || !local_storage || attr_inside
}

/// `std::span<T>`, or `std::span<T const>` for a const element.
pub fn span_type_text(element: &str, element_const: bool) -> String {
    if element_const {
        format!("std::span<{element} const>")
    } else {
        format!("std::span<{element}>")
    }
}

/// Offset just past the last `*` of the declarator, before the name.
fn pointer_declarator_end(tu: &TranslationUnit, var: &VarDecl) -> Option<usize> {
    if var.name_span.start < var.span.start {
        return None;
    }
    let prefix = tu.text(Span::new(var.span.start, var.name_span.start));
    prefix.rfind('*').map(|star| var.span.start + star + 1)
}

/// Pointee type as written, without `const`, and whether it was
/// const-qualified.
pub fn pointee_type_text(tu: &TranslationUnit, var: &VarDecl) -> Option<(String, bool)> {
    let pointee = var.ty.pointee()?;
    let element_const = var.ty.pointee_is_const();
    let written = pointer_declarator_end(tu, var).map(|end| {
        tu.text(Span::new(var.span.start, end - 1))
            .split_whitespace()
            .filter(|word| *word != "const")
            .collect::<Vec<_>>()
            .join(" ")
    });
    let text = match written {
        Some(text) if !text.is_empty() => text,
        _ => pointee.spelling(),
    };
    Some((text, element_const))
}

/// Dispatches on the strategy chosen for `id`.
pub fn fix_variable(
    tu: &TranslationUnit,
    id: DeclId,
    kind: StrategyKind,
    function: DeclId,
    tracker: &DeclUseTracker,
    handler: &mut dyn UnsafeBufferUsageHandler,
) -> Vec<TextEdit> {
    let Some(var) = tu.tree.var(id) else {
        return Vec::new();
    };
    if var.is_parameter() {
        let Some(owner) = var.owner.filter(|owner| *owner == function) else {
            decl_fail(handler, id, var, " : function not currently analyzed");
            return Vec::new();
        };
        let Some(fun) = tu.tree.function(owner) else {
            return Vec::new();
        };
        if fun.is_main()
            || fun.is_constexpr
            || fun.is_template
            || fun.is_variadic
            || fun.kind.is_method()
            || fun.is_function_try_block
            || fun.is_overloaded_operator
        {
            decl_fail(handler, id, var, " : unsupported function decl");
            return Vec::new();
        }
    }

    match kind {
        StrategyKind::Span => {
            if var.ty.is_pointer() {
                if var.is_parameter() {
                    return fix_param_with_span(tu, id, var, handler);
                }
                if matches!(var.storage, Storage::Local | Storage::StaticLocal) {
                    return fix_variable_with_span(tu, id, var, tracker, handler);
                }
            }
            decl_fail(handler, id, var, " : not a pointer");
            Vec::new()
        }
        StrategyKind::Array => {
            let is_local = matches!(var.storage, Storage::Local | Storage::StaticLocal);
            if is_local && var.ty.constant_array_size().is_some() {
                return fix_variable_with_array(tu, id, var, tracker, handler);
            }
            decl_fail(handler, id, var, " : not a local const-size array");
            Vec::new()
        }
        StrategyKind::Wontfix | StrategyKind::Iterator | StrategyKind::Vector => {
            decl_fail(handler, id, var, " : unsupported strategy");
            Vec::new()
        }
    }
}

fn single_decl_stmt(tu: &TranslationUnit, tracker: &DeclUseTracker, id: DeclId) -> Result<NodeId, &'static str> {
    let stmt = tracker
        .lookup_decl(id)
        .ok_or(" : variables declared this way not implemented yet")?;
    match tu.tree.kind(stmt) {
        Some(NodeKind::DeclStmt { decls }) if decls.len() == 1 => Ok(stmt),
        _ => Err(" : multiple VarDecls"),
    }
}

fn fix_variable_with_span(
    tu: &TranslationUnit,
    id: DeclId,
    var: &VarDecl,
    tracker: &DeclUseTracker,
    handler: &mut dyn UnsafeBufferUsageHandler,
) -> Vec<TextEdit> {
    if let Err(reason) = single_decl_stmt(tu, tracker, id) {
        decl_fail(handler, id, var, reason);
        return Vec::new();
    }
    fix_local_var_decl_with_span(tu, id, var, handler)
}

/// `T *p = init;` to `std::span<T> p = {init, extent};`.
fn fix_local_var_decl_with_span(
    tu: &TranslationUnit,
    id: DeclId,
    var: &VarDecl,
    handler: &mut dyn UnsafeBufferUsageHandler,
) -> Vec<TextEdit> {
    if has_unsupported_specifiers(var) {
        decl_fail(handler, id, var, " : has unsupport specifier(s)");
        return Vec::new();
    }
    let Some((element, element_const)) = pointee_type_text(tu, var) else {
        decl_fail(handler, id, var, " : failed to generate 'std::span' type");
        return Vec::new();
    };
    let mut replacement = span_type_text(&element, element_const);

    let mut edits = Vec::new();
    if let Some(init) = var.init {
        match fix_var_initializer_with_span(tu, var, init) {
            Some(init_edits) => edits.extend(init_edits),
            None => return Vec::new(),
        }
    }

    let Some(type_end) = pointer_declarator_end(tu, var) else {
        decl_fail(handler, id, var, " : failed to locate the end of the declaration");
        return Vec::new();
    };
    if type_end == var.name_span.start {
        replacement.push(' ');
    }
    edits.push(TextEdit::replace(var.span.start, type_end, replacement));
    edits
}

/// Edits turning a pointer initializer into a span initializer. `None` when
/// no valid rewrite exists; an empty list when the initializer stays.
fn fix_var_initializer_with_span(tu: &TranslationUnit, var: &VarDecl, init: NodeId) -> Option<Vec<TextEdit>> {
    let tree = &tu.tree;
    let init_span = tree.span(init);

    // A null pointer leaves a default-constructed span.
    if is_null_pointer_constant(tree, init) {
        if init_span.end < var.name_span.end {
            return None;
        }
        return Some(vec![TextEdit::delete(var.name_span.end, init_span.end)]);
    }

    let stripped = tree.ignore_imp_casts(init);
    let mut extent = user_fill_placeholder("placeholder");
    match tree.kind(stripped) {
        Some(NodeKind::New {
            array_size,
            is_array,
            ..
        }) => match array_size {
            Some(size) if !has_side_effects(tree, *size) => {
                extent = tu.text(tree.span(*size)).to_string();
            }
            Some(_) => {}
            None if !is_array => extent = "1".to_string(),
            None => {}
        },
        _ if tree.ty(stripped).constant_array_size().is_some() => return Some(Vec::new()),
        Some(NodeKind::Unary {
            op: UnaryOp::AddrOf,
            operand,
            ..
        }) if matches!(tree.kind(*operand), Some(NodeKind::DeclRef { .. })) => {
            extent = "1".to_string();
        }
        _ => {}
    }

    Some(vec![
        TextEdit::insert(init_span.start, "{"),
        TextEdit::insert(init_span.end, format!(", {extent}}}")),
    ])
}

/// `T *p` parameter to `std::span<T> p`.
fn fix_param_with_span(
    tu: &TranslationUnit,
    id: DeclId,
    var: &VarDecl,
    handler: &mut dyn UnsafeBufferUsageHandler,
) -> Vec<TextEdit> {
    if has_unsupported_specifiers(var) {
        decl_fail(handler, id, var, " : has unsupport specifier(s)");
        return Vec::new();
    }
    if var.default_arg.is_some() {
        decl_fail(handler, id, var, " : has default arg");
        return Vec::new();
    }
    let Some((element, element_const)) = pointee_type_text(tu, var) else {
        decl_fail(handler, id, var, " : invalid pointee type");
        return Vec::new();
    };
    if var.name.is_empty() {
        decl_fail(handler, id, var, " : invalid identifier name");
        return Vec::new();
    }
    let mut replacement = span_type_text(&element, element_const);
    if var.is_const {
        replacement.push_str(" const");
    }
    replacement.push(' ');
    replacement.push_str(&var.name);
    vec![TextEdit::replace_span(var.span, replacement)]
}

fn fix_variable_with_array(
    tu: &TranslationUnit,
    id: DeclId,
    var: &VarDecl,
    tracker: &DeclUseTracker,
    handler: &mut dyn UnsafeBufferUsageHandler,
) -> Vec<TextEdit> {
    if single_decl_stmt(tu, tracker, id).is_err() {
        return Vec::new();
    }
    fix_var_decl_with_array(tu, id, var, handler)
}

/// `T a[N]` to `std::array<T, N> a`.
fn fix_var_decl_with_array(
    tu: &TranslationUnit,
    id: DeclId,
    var: &VarDecl,
    handler: &mut dyn UnsafeBufferUsageHandler,
) -> Vec<TextEdit> {
    let Some(element) = var.ty.element() else {
        return Vec::new();
    };
    if element.is_array() {
        return Vec::new();
    }
    if var.name_span.start < var.span.start || var.name_span.end > var.span.end {
        decl_fail(handler, id, var, " : failed to locate the identifier");
        return Vec::new();
    }
    let element_text = tu
        .text(Span::new(var.span.start, var.name_span.start))
        .trim();

    let after_name = tu.text(Span::new(var.name_span.end, var.span.end));
    let Some(open) = after_name.find('[') else {
        return Vec::new();
    };
    let Some(close) = matching_close_bracket(after_name, open) else {
        decl_fail(handler, id, var, " : failed to locate the array size");
        return Vec::new();
    };
    let size_text = after_name[open + 1..close].trim();
    if size_text.is_empty() {
        return Vec::new();
    }

    let type_end = var.name_span.end + close + 1;
    let name = tu.text(var.name_span);
    vec![TextEdit::replace(
        var.span.start,
        type_end,
        format!("std::array<{element_text}, {size_text}> {name}"),
    )]
}

/// Byte offset of the `]` closing the `[` at `open`, skipping nested
/// brackets, parentheses and character or string literals.
fn matching_close_bracket(text: &str, open: usize) -> Option<usize> {
    let mut closers = Vec::new();
    let mut quote = None;
    let mut escaped = false;
    for (offset, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                _ if c == q => quote = None,
                _ => {}
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' => closers.push(']'),
            '(' => closers.push(')'),
            '{' => closers.push('}'),
            ']' | ')' | '}' => {
                if closers.pop()? != c {
                    return None;
                }
                if closers.is_empty() {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Span, TreeBuilder, Type};
    use crate::fix::apply_fixes;
    use crate::handler::tests::PolicyStub;

    fn tracked(tu: &TranslationUnit, var: DeclId, stmt: NodeId) -> DeclUseTracker {
        let mut tracker = DeclUseTracker::default();
        tracker.observe(&tu.tree, stmt);
        assert_eq!(tracker.lookup_decl(var), Some(stmt));
        tracker
    }

    #[test]
    fn local_pointer_initialized_with_new_array() {
        let text = "void f() { int *p = new int[10]; }";
        let mut b = TreeBuilder::new(text);
        let f = b.function("f", "void f()");
        let ten = b.int_lit_at("10");
        let span = b.find("new int[10]");
        let alloc = b.new_expr(Some(ten), Type::int(), span);
        let p = b.local("p", Type::pointer_to(Type::int()), "int *p = new int[10]", Some(alloc));
        let stmt = b.decl_stmt(vec![p]);
        let tu = b.finish().expect("builds");

        let tracker = tracked(&tu, p, stmt);
        let mut handler = PolicyStub::default();
        let edits = fix_variable(&tu, p, StrategyKind::Span, f, &tracker, &mut handler);
        let fixed = apply_fixes(&tu.file.text, &edits).expect("applies");
        assert_eq!(fixed, "void f() { std::span<int> p = {new int[10], 10}; }");
    }

    #[test]
    fn const_pointee_and_unknown_extent() {
        let text = "void f(const char *s) { const char *p = s; }";
        let mut b = TreeBuilder::new(text);
        let f = b.function("f", "void f(const char *s)");
        let s = b.param(f, "s", Type::const_pointer_to(Type::char()), "const char *s");
        let s_ref = b.var_ref_at(s, "s", 1);
        let load = b.load(s_ref);
        let p = b.local("p", Type::const_pointer_to(Type::char()), "const char *p = s", Some(load));
        let stmt = b.decl_stmt(vec![p]);
        let tu = b.finish().expect("builds");

        let tracker = tracked(&tu, p, stmt);
        let mut handler = PolicyStub::default();
        let edits = fix_variable(&tu, p, StrategyKind::Span, f, &tracker, &mut handler);
        let fixed = apply_fixes(&tu.file.text, &edits).expect("applies");
        assert_eq!(
            fixed,
            "void f(const char *s) { std::span<char const> p = {s, <# placeholder #>}; }"
        );
    }

    #[test]
    fn null_initializer_is_dropped() {
        let text = "void f() { int * p = nullptr; }";
        let mut b = TreeBuilder::new(text);
        let f = b.function("f", "void f()");
        let null_span = b.find("nullptr");
        let null = b.null_ptr(null_span);
        let p = b.local("p", Type::pointer_to(Type::int()), "int * p = nullptr", Some(null));
        let stmt = b.decl_stmt(vec![p]);
        let tu = b.finish().expect("builds");

        let tracker = tracked(&tu, p, stmt);
        let mut handler = PolicyStub::default();
        let edits = fix_variable(&tu, p, StrategyKind::Span, f, &tracker, &mut handler);
        let fixed = apply_fixes(&tu.file.text, &edits).expect("applies");
        assert_eq!(fixed, "void f() { std::span<int> p; }");
    }

    #[test]
    fn constant_array_becomes_std_array() {
        let text = "void f() { int a[4] = {0}; }";
        let mut b = TreeBuilder::new(text);
        let f = b.function("f", "void f()");
        let a = b.local("a", Type::array_of(Type::int(), 4), "int a[4] = {0}", None);
        let stmt = b.decl_stmt(vec![a]);
        let tu = b.finish().expect("builds");

        let tracker = tracked(&tu, a, stmt);
        let mut handler = PolicyStub::default();
        let edits = fix_variable(&tu, a, StrategyKind::Array, f, &tracker, &mut handler);
        let fixed = apply_fixes(&tu.file.text, &edits).expect("applies");
        assert_eq!(fixed, "void f() { std::array<int, 4> a = {0}; }");
    }

    #[test]
    fn array_size_with_nested_subscript() {
        let text = "int g[4];\nvoid f() { int a[sizeof(g[0])]; }";
        let mut b = TreeBuilder::new(text);
        b.global("g", Type::array_of(Type::int(), 4), "int g[4]");
        let f = b.function("f", "void f()");
        let a = b.local("a", Type::array_of(Type::int(), 4), "int a[sizeof(g[0])]", None);
        let stmt = b.decl_stmt(vec![a]);
        let tu = b.finish().expect("builds");

        let tracker = tracked(&tu, a, stmt);
        let mut handler = PolicyStub::default();
        let edits = fix_variable(&tu, a, StrategyKind::Array, f, &tracker, &mut handler);
        let fixed = apply_fixes(&tu.file.text, &edits).expect("applies");
        assert_eq!(fixed, "int g[4];\nvoid f() { std::array<int, sizeof(g[0])> a; }");
    }

    #[test]
    fn unbalanced_array_size_is_not_guessed() {
        assert_eq!(matching_close_bracket("a[sizeof(g[0])]", 1), Some(14));
        assert_eq!(matching_close_bracket("a[s(']')]", 1), Some(8));
        assert_eq!(matching_close_bracket("a[f(0]", 1), None);
        assert_eq!(matching_close_bracket("a[g[0]", 1), None);
    }

    #[test]
    fn unsized_array_new_keeps_the_placeholder() {
        let text = "void f() { int *p = new int[]{1, 2}; }";
        let mut b = TreeBuilder::new(text);
        let f = b.function("f", "void f()");
        let span = b.find("new int[]{1, 2}");
        let alloc = b.new_array_unsized(Type::int(), None, span);
        let p = b.local("p", Type::pointer_to(Type::int()), "int *p = new int[]{1, 2}", Some(alloc));
        let stmt = b.decl_stmt(vec![p]);
        let tu = b.finish().expect("builds");

        let tracker = tracked(&tu, p, stmt);
        let mut handler = PolicyStub::default();
        let edits = fix_variable(&tu, p, StrategyKind::Span, f, &tracker, &mut handler);
        let fixed = apply_fixes(&tu.file.text, &edits).expect("applies");
        assert_eq!(
            fixed,
            "void f() { std::span<int> p = {new int[]{1, 2}, <# placeholder #>}; }"
        );
    }

    #[test]
    fn single_object_new_has_extent_one() {
        let text = "void f() { int *p = new int; }";
        let mut b = TreeBuilder::new(text);
        let f = b.function("f", "void f()");
        let span = b.find("new int");
        let alloc = b.new_expr(None, Type::int(), span);
        let p = b.local("p", Type::pointer_to(Type::int()), "int *p = new int", Some(alloc));
        let stmt = b.decl_stmt(vec![p]);
        let tu = b.finish().expect("builds");

        let tracker = tracked(&tu, p, stmt);
        let mut handler = PolicyStub::default();
        let edits = fix_variable(&tu, p, StrategyKind::Span, f, &tracker, &mut handler);
        let fixed = apply_fixes(&tu.file.text, &edits).expect("applies");
        assert_eq!(fixed, "void f() { std::span<int> p = {new int, 1}; }");
    }

    #[test]
    fn parameters_of_main_are_left_alone() {
        let text = "int main(int argc, char **argv) { return 0; }";
        let mut b = TreeBuilder::new(text);
        let main = b.function("main", "int main(int argc, char **argv)");
        let argv = b.param(
            main,
            "argv",
            Type::pointer_to(Type::pointer_to(Type::char())),
            "char **argv",
        );
        let tu = b.finish().expect("builds");

        let tracker = DeclUseTracker::default();
        let mut handler = PolicyStub::default();
        let edits = fix_variable(&tu, argv, StrategyKind::Span, main, &tracker, &mut handler);
        assert!(edits.is_empty());
        assert_eq!(handler.debug_notes.len(), 1);
        assert!(handler.debug_notes[0].contains("unsupported function decl"));
    }

    #[test]
    fn attributes_inside_the_declaration_block_rewrites() {
        let text = "void f() { int *p [[maybe_unused]]; }";
        let mut b = TreeBuilder::new(text);
        b.function("f", "void f()");
        let p = b.local("p", Type::pointer_to(Type::int()), "int *p [[maybe_unused]]", None);
        let attr = b.find("[[maybe_unused]]");
        if let Some(var) = b.var_mut(p) {
            var.attrs.push(attr);
        }
        let tu = b.finish().expect("builds");
        let var = tu.tree.var(p).expect("var");
        assert!(has_unsupported_specifiers(var));
        assert_eq!(var.attrs, vec![Span::new(18, 34)]);
    }
}
