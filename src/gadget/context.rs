//! Syntactic contexts in which a pointer use can be rewritten.
//!
//! Each function maps a visited node to the sub-expressions that sit in the
//! context, so fixable recognizers can be written against the candidate
//! alone.

use crate::ast::{BinaryOp, CastKind, NodeId, NodeKind, SyntaxTree};

use super::has_pointer_type;

/// Expression whose value is read or assigned: the operand of an
/// lvalue-to-rvalue conversion, or the left side of a plain assignment.
pub fn lvalue_context(tree: &SyntaxTree, id: NodeId) -> Option<NodeId> {
    match tree.kind(id)? {
        NodeKind::ImplicitCast {
            cast: CastKind::LValueToRValue,
            inner,
        } => Some(*inner),
        NodeKind::Binary {
            op: BinaryOp::Assign,
            lhs,
            ..
        } => Some(*lhs),
        _ => None,
    }
}

/// Expressions where only the raw pointer value is consumed.
pub fn pointer_context(tree: &SyntaxTree, id: NodeId) -> Vec<NodeId> {
    let Some(kind) = tree.kind(id) else {
        return Vec::new();
    };
    match kind {
        NodeKind::Call {
            callee: Some(callee),
            args,
            ..
        }
        | NodeKind::MemberCall {
            callee: Some(callee),
            args,
            ..
        } => {
            let Some(fun) = tree.function(*callee) else {
                return Vec::new();
            };
            if fun.unsafe_buffer_usage {
                return Vec::new();
            }
            fun.params
                .iter()
                .zip(args)
                .filter(|(param, _)| tree.var(**param).is_some_and(|var| var.ty.is_pointer()))
                .map(|(_, arg)| *arg)
                .collect()
        }
        NodeKind::ImplicitCast { cast, inner } | NodeKind::ExplicitCast { cast, inner, .. }
            if matches!(cast, CastKind::PointerToIntegral | CastKind::PointerToBoolean)
                && has_pointer_type(tree, *inner) =>
        {
            vec![*inner]
        }
        NodeKind::Binary { op, lhs, rhs, .. } if op.is_comparison() => [*lhs, *rhs]
            .into_iter()
            .filter(|operand| has_pointer_type(tree, *operand))
            .collect(),
        NodeKind::Binary {
            op: BinaryOp::Sub,
            lhs,
            rhs,
            ..
        } if has_pointer_type(tree, *lhs) && has_pointer_type(tree, *rhs) => vec![*lhs, *rhs],
        _ => Vec::new(),
    }
}

/// Statements whose value is discarded: the members of a compound
/// statement and the branches of an `if`.
pub fn untyped_context(tree: &SyntaxTree, id: NodeId) -> Vec<NodeId> {
    match tree.kind(id) {
        Some(NodeKind::Compound { stmts }) => stmts.clone(),
        Some(NodeKind::If {
            then, otherwise, ..
        }) => std::iter::once(*then).chain(*otherwise).collect(),
        _ => Vec::new(),
    }
}
