//! Unsafe operations that are reported whether or not a fix exists.

use crate::ast::{BinaryOp, Language, NodeId, NodeKind, Span, SyntaxTree, UnaryOp};
use crate::handler::UnsafeBufferUsageHandler;
use crate::libc::{LibcCallKind, classify_call};
use crate::oracle::{array_subscript_is_safe, span_two_arg_construct_is_safe};

use super::{DeclUseList, claim_if_var_ref, has_pointer_or_array_type, has_pointer_type};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningGadget {
    /// `p++` / `++p` on a pointer.
    Increment { op: NodeId },
    /// `p--` / `--p` on a pointer.
    Decrement { op: NodeId },
    /// `p[i]` not provably in bounds.
    ArraySubscript { node: NodeId },
    /// `p + n`, `n + p`, `p - n`, `p += n`, `p -= n`.
    PointerArithmetic { op: NodeId, ptr: NodeId },
    /// Call of a function, or access of a field, marked
    /// `[[clang::unsafe_buffer_usage]]`.
    UnsafeBufferUsageAttr { op: NodeId },
    /// Construction through a constructor marked with the attribute.
    UnsafeBufferUsageCtorAttr { op: NodeId },
    /// Explicit cast of `container.data()`.
    DataInvocation { op: NodeId },
    UnsafeLibcFunctionCall {
        call: NodeId,
        kind: LibcCallKind,
        unsafe_arg: Option<NodeId>,
    },
    /// `std::span{ptr, size}` whose bounds cannot be proven consistent.
    SpanTwoParamConstructor { ctor: NodeId },
}

impl WarningGadget {
    /// Recognizes the first unsafe operation rooted at `id` that is outside
    /// any opt-out region.
    pub fn recognize(
        tree: &SyntaxTree,
        language: Language,
        id: NodeId,
        handler: &dyn UnsafeBufferUsageHandler,
    ) -> Option<Self> {
        let start = tree.span(id).start;
        let gadget = match_increment(tree, id)
            .or_else(|| match_decrement(tree, id))
            .or_else(|| match_array_subscript(tree, id))
            .or_else(|| match_pointer_arithmetic(tree, id))
            .or_else(|| match_attr_usage(tree, id))
            .or_else(|| match_ctor_attr_usage(tree, id))
            .or_else(|| match_data_invocation(tree, id))
            .or_else(|| match_libc_call(tree, language, id, handler))
            .or_else(|| match_span_construction(tree, id, handler))?;
        (!handler.is_safe_buffer_opt_out(start)).then_some(gadget)
    }

    pub fn name(&self) -> &'static str {
        match self {
            WarningGadget::Increment { .. } => "Increment",
            WarningGadget::Decrement { .. } => "Decrement",
            WarningGadget::ArraySubscript { .. } => "ArraySubscript",
            WarningGadget::PointerArithmetic { .. } => "PointerArithmetic",
            WarningGadget::UnsafeBufferUsageAttr { .. } => "UnsafeBufferUsageAttr",
            WarningGadget::UnsafeBufferUsageCtorAttr { .. } => "UnsafeBufferUsageCtorAttr",
            WarningGadget::DataInvocation { .. } => "DataInvocation",
            WarningGadget::UnsafeLibcFunctionCall { .. } => "UnsafeLibcFunctionCall",
            WarningGadget::SpanTwoParamConstructor { .. } => "SpanTwoParamConstructor",
        }
    }

    /// Node the finding is reported on.
    pub fn node(&self) -> NodeId {
        match self {
            WarningGadget::Increment { op }
            | WarningGadget::Decrement { op }
            | WarningGadget::PointerArithmetic { op, .. }
            | WarningGadget::UnsafeBufferUsageAttr { op }
            | WarningGadget::UnsafeBufferUsageCtorAttr { op }
            | WarningGadget::DataInvocation { op } => *op,
            WarningGadget::ArraySubscript { node } => *node,
            WarningGadget::UnsafeLibcFunctionCall { call, .. } => *call,
            WarningGadget::SpanTwoParamConstructor { ctor } => *ctor,
        }
    }

    pub fn span(&self, tree: &SyntaxTree) -> Span {
        tree.span(self.node())
    }

    /// Variable references this operation is blamed on.
    pub fn claimed_var_uses(&self, tree: &SyntaxTree) -> DeclUseList {
        match self {
            WarningGadget::Increment { op } | WarningGadget::Decrement { op } => {
                match unary_operand(tree, *op) {
                    Some(operand) => claim_if_var_ref(tree, tree.ignore_paren_imp_casts(operand)),
                    None => Vec::new(),
                }
            }
            WarningGadget::ArraySubscript { node } => match tree.kind(*node) {
                Some(NodeKind::Subscript { base, .. }) => {
                    claim_if_var_ref(tree, tree.ignore_paren_imp_casts(*base))
                }
                _ => Vec::new(),
            },
            WarningGadget::PointerArithmetic { ptr, .. } => {
                claim_if_var_ref(tree, tree.ignore_paren_imp_casts(*ptr))
            }
            WarningGadget::SpanTwoParamConstructor { ctor } => match tree.kind(*ctor) {
                Some(NodeKind::Construct { args, .. }) => args
                    .first()
                    .map(|first| claim_if_var_ref(tree, *first))
                    .unwrap_or_default(),
                _ => Vec::new(),
            },
            WarningGadget::UnsafeBufferUsageAttr { .. }
            | WarningGadget::UnsafeBufferUsageCtorAttr { .. }
            | WarningGadget::DataInvocation { .. }
            | WarningGadget::UnsafeLibcFunctionCall { .. } => Vec::new(),
        }
    }

    /// Pointer-valued expressions whose unchecked use makes this operation
    /// unsafe.
    pub fn unsafe_ptrs(&self, tree: &SyntaxTree) -> Vec<NodeId> {
        match self {
            WarningGadget::Increment { op } | WarningGadget::Decrement { op } => {
                unary_operand(tree, *op)
                    .map(|operand| vec![tree.ignore_paren_imp_casts(operand)])
                    .unwrap_or_default()
            }
            WarningGadget::ArraySubscript { node } => match tree.kind(*node) {
                Some(NodeKind::Subscript { base, .. }) => vec![tree.ignore_paren_imp_casts(*base)],
                _ => Vec::new(),
            },
            WarningGadget::PointerArithmetic { ptr, .. } => vec![tree.ignore_paren_imp_casts(*ptr)],
            WarningGadget::UnsafeBufferUsageAttr { .. }
            | WarningGadget::UnsafeBufferUsageCtorAttr { .. }
            | WarningGadget::DataInvocation { .. }
            | WarningGadget::UnsafeLibcFunctionCall { .. }
            | WarningGadget::SpanTwoParamConstructor { .. } => Vec::new(),
        }
    }

    /// Reports this operation. `is_related_to_decl` is set when it is listed
    /// under a variable finding instead of standing alone.
    pub fn report(&self, handler: &mut dyn UnsafeBufferUsageHandler, is_related_to_decl: bool) {
        match self {
            WarningGadget::UnsafeLibcFunctionCall {
                call,
                kind,
                unsafe_arg,
            } => handler.handle_unsafe_libc_call(*call, *kind, *unsafe_arg),
            WarningGadget::SpanTwoParamConstructor { ctor } => {
                handler.handle_unsafe_operation_in_container(*ctor, is_related_to_decl)
            }
            _ => handler.handle_unsafe_operation(self.node(), is_related_to_decl),
        }
    }
}

fn unary_operand(tree: &SyntaxTree, id: NodeId) -> Option<NodeId> {
    match tree.kind(id)? {
        NodeKind::Unary { operand, .. } => Some(*operand),
        _ => None,
    }
}

fn match_increment(tree: &SyntaxTree, id: NodeId) -> Option<WarningGadget> {
    match tree.kind(id)? {
        NodeKind::Unary {
            op: UnaryOp::PreInc | UnaryOp::PostInc,
            operand,
            ..
        } if has_pointer_type(tree, tree.ignore_paren_imp_casts(*operand)) => {
            Some(WarningGadget::Increment { op: id })
        }
        _ => None,
    }
}

fn match_decrement(tree: &SyntaxTree, id: NodeId) -> Option<WarningGadget> {
    match tree.kind(id)? {
        NodeKind::Unary {
            op: UnaryOp::PreDec | UnaryOp::PostDec,
            operand,
            ..
        } if has_pointer_type(tree, tree.ignore_paren_imp_casts(*operand)) => {
            Some(WarningGadget::Decrement { op: id })
        }
        _ => None,
    }
}

fn match_array_subscript(tree: &SyntaxTree, id: NodeId) -> Option<WarningGadget> {
    let NodeKind::Subscript { base, index } = tree.kind(id)? else {
        return None;
    };
    if !has_pointer_or_array_type(tree, tree.ignore_paren_imp_casts(*base)) {
        return None;
    }
    let trivially_safe = matches!(
        tree.kind(*index),
        Some(NodeKind::IntegerLiteral { value: 0 } | NodeKind::ArrayInitIndex)
    );
    if trivially_safe || array_subscript_is_safe(tree, *base, *index) {
        return None;
    }
    Some(WarningGadget::ArraySubscript { node: id })
}

fn is_integer_like(tree: &SyntaxTree, id: NodeId) -> bool {
    let ty = tree.ty(id);
    ty.is_integer() || ty.is_enum()
}

fn match_pointer_arithmetic(tree: &SyntaxTree, id: NodeId) -> Option<WarningGadget> {
    let NodeKind::Binary { op, lhs, rhs, .. } = tree.kind(id)? else {
        return None;
    };
    let (lhs, rhs) = (*lhs, *rhs);
    if !matches!(
        op,
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::AddAssign | BinaryOp::SubAssign
    ) {
        return None;
    }
    if has_pointer_type(tree, lhs) && is_integer_like(tree, rhs) {
        return Some(WarningGadget::PointerArithmetic { op: id, ptr: lhs });
    }
    if *op == BinaryOp::Add && has_pointer_type(tree, rhs) && is_integer_like(tree, lhs) {
        return Some(WarningGadget::PointerArithmetic { op: id, ptr: rhs });
    }
    None
}

fn match_attr_usage(tree: &SyntaxTree, id: NodeId) -> Option<WarningGadget> {
    let marked = match tree.kind(id)? {
        NodeKind::Call {
            callee: Some(callee),
            ..
        }
        | NodeKind::MemberCall {
            callee: Some(callee),
            ..
        } => tree
            .function(*callee)
            .is_some_and(|fun| fun.unsafe_buffer_usage),
        NodeKind::Member {
            is_field,
            unsafe_buffer_usage,
            ..
        } => *is_field && *unsafe_buffer_usage,
        _ => false,
    };
    marked.then_some(WarningGadget::UnsafeBufferUsageAttr { op: id })
}

fn match_ctor_attr_usage(tree: &SyntaxTree, id: NodeId) -> Option<WarningGadget> {
    match tree.kind(id)? {
        NodeKind::Construct {
            unsafe_buffer_usage: true,
            ..
        } if !is_unsafe_span_construction(tree, id) => {
            Some(WarningGadget::UnsafeBufferUsageCtorAttr { op: id })
        }
        _ => None,
    }
}

fn match_data_invocation(tree: &SyntaxTree, id: NodeId) -> Option<WarningGadget> {
    let NodeKind::ExplicitCast { inner, .. } = tree.kind(id)? else {
        return None;
    };
    let call = match tree.kind(*inner)? {
        NodeKind::Paren { inner } => *inner,
        _ => *inner,
    };
    match tree.kind(call)? {
        NodeKind::MemberCall {
            method,
            record: Some(record),
            ..
        } if method == "data" && record.is_sized_container_or_view() => {
            Some(WarningGadget::DataInvocation { op: id })
        }
        _ => None,
    }
}

fn match_libc_call(
    tree: &SyntaxTree,
    language: Language,
    id: NodeId,
    handler: &dyn UnsafeBufferUsageHandler,
) -> Option<WarningGadget> {
    if !matches!(tree.kind(id)?, NodeKind::Call { .. }) {
        return None;
    }
    if !language.is_cxx() || handler.ignore_unsafe_buffer_in_libc_call(tree.span(id).start) {
        return None;
    }
    let found = classify_call(tree, id)?;
    Some(WarningGadget::UnsafeLibcFunctionCall {
        call: id,
        kind: found.kind,
        unsafe_arg: found.unsafe_arg,
    })
}

/// Two-argument `std::span` construction that cannot be proven consistent,
/// regardless of the container policy.
fn is_unsafe_span_construction(tree: &SyntaxTree, id: NodeId) -> bool {
    match tree.kind(id) {
        Some(NodeKind::Construct { record, args, .. }) => {
            record.in_std
                && record.name == "span"
                && args.len() == 2
                && !span_two_arg_construct_is_safe(tree, args[0], args[1])
        }
        _ => false,
    }
}

fn match_span_construction(
    tree: &SyntaxTree,
    id: NodeId,
    handler: &dyn UnsafeBufferUsageHandler,
) -> Option<WarningGadget> {
    if !matches!(tree.kind(id)?, NodeKind::Construct { .. }) {
        return None;
    }
    if handler.ignore_unsafe_buffer_in_container(tree.span(id).start) {
        return None;
    }
    is_unsafe_span_construction(tree, id).then_some(WarningGadget::SpanTwoParamConstructor { ctor: id })
}
