//! Constant folding and side-effect queries over expression nodes.

use super::{BinaryOp, CastKind, NodeId, NodeKind, SyntaxTree, UnaryOp};

const MAX_FOLD_DEPTH: usize = 32;

/// Folds an integer constant expression, following `const` variables with
/// constant initializers.
pub fn eval_int(tree: &SyntaxTree, id: NodeId) -> Option<i128> {
    fold(tree, id, 0)
}

fn fold(tree: &SyntaxTree, id: NodeId, depth: usize) -> Option<i128> {
    if depth > MAX_FOLD_DEPTH {
        return None;
    }
    let next = depth + 1;
    match tree.kind(id)? {
        NodeKind::IntegerLiteral { value } => Some(*value),
        NodeKind::Paren { inner } => fold(tree, *inner, next),
        NodeKind::ImplicitCast { cast, inner } | NodeKind::ExplicitCast { cast, inner, .. } => {
            match cast {
                CastKind::LValueToRValue
                | CastKind::IntegralCast
                | CastKind::NoOp
                | CastKind::NullToPointer => fold(tree, *inner, next),
                CastKind::IntegralToBoolean => fold(tree, *inner, next).map(|v| i128::from(v != 0)),
                _ => None,
            }
        }
        NodeKind::DeclRef { decl } => {
            let var = tree.var(*decl)?;
            if !(var.is_const || var.is_constexpr) || !var.ty.is_integer() {
                return None;
            }
            fold(tree, var.init?, next)
        }
        NodeKind::Unary { op, operand, .. } => {
            let value = fold(tree, *operand, next)?;
            match op {
                UnaryOp::Plus => Some(value),
                UnaryOp::Minus => value.checked_neg(),
                UnaryOp::Not => Some(!value),
                UnaryOp::LNot => Some(i128::from(value == 0)),
                _ => None,
            }
        }
        NodeKind::Binary { op, lhs, rhs, .. } => {
            let l = fold(tree, *lhs, next)?;
            let r = fold(tree, *rhs, next)?;
            fold_binary(*op, l, r)
        }
        NodeKind::Conditional {
            cond,
            then,
            otherwise,
        } => {
            if fold(tree, *cond, next)? != 0 {
                fold(tree, *then, next)
            } else {
                fold(tree, *otherwise, next)
            }
        }
        NodeKind::Unevaluated { value, .. } => *value,
        _ => None,
    }
}

fn fold_binary(op: BinaryOp, l: i128, r: i128) -> Option<i128> {
    match op {
        BinaryOp::Add => l.checked_add(r),
        BinaryOp::Sub => l.checked_sub(r),
        BinaryOp::Mul => l.checked_mul(r),
        BinaryOp::Div => l.checked_div(r),
        BinaryOp::Rem => l.checked_rem(r),
        BinaryOp::Shl => u32::try_from(r).ok().and_then(|s| l.checked_shl(s)),
        BinaryOp::Shr => u32::try_from(r).ok().and_then(|s| l.checked_shr(s)),
        BinaryOp::Lt => Some(i128::from(l < r)),
        BinaryOp::Gt => Some(i128::from(l > r)),
        BinaryOp::Le => Some(i128::from(l <= r)),
        BinaryOp::Ge => Some(i128::from(l >= r)),
        BinaryOp::Eq => Some(i128::from(l == r)),
        BinaryOp::Ne => Some(i128::from(l != r)),
        BinaryOp::And => Some(l & r),
        BinaryOp::Xor => Some(l ^ r),
        BinaryOp::Or => Some(l | r),
        BinaryOp::LAnd => Some(i128::from(l != 0 && r != 0)),
        BinaryOp::LOr => Some(i128::from(l != 0 || r != 0)),
        BinaryOp::Comma => Some(r),
        _ => None,
    }
}

/// `nullptr`, `__null`, or an integer constant zero (possibly converted).
pub fn is_null_pointer_constant(tree: &SyntaxTree, id: NodeId) -> bool {
    let stripped = tree.ignore_paren_casts(id);
    match tree.kind(stripped) {
        Some(NodeKind::NullPtr) => true,
        Some(_) => tree.ty(stripped).is_integer() && eval_int(tree, stripped) == Some(0),
        None => false,
    }
}

/// Conservative: anything that may write memory or call out counts.
pub fn has_side_effects(tree: &SyntaxTree, id: NodeId) -> bool {
    let Some(kind) = tree.kind(id) else {
        return false;
    };
    match kind {
        NodeKind::Call { .. }
        | NodeKind::MemberCall { .. }
        | NodeKind::Construct { .. }
        | NodeKind::New { .. }
        | NodeKind::Lambda { .. }
        | NodeKind::BlockExpr { .. } => true,
        NodeKind::Unary { op, .. } if op.is_increment_decrement() => true,
        NodeKind::Binary { op, .. } if op.is_assignment() => true,
        NodeKind::Unevaluated { .. } => false,
        _ => tree
            .children(id)
            .into_iter()
            .any(|child| has_side_effects(tree, child)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Span, TreeBuilder, Type};

    #[test]
    fn folds_arithmetic_and_const_vars() {
        let mut b = TreeBuilder::new("const int N = 4; N * 2 - 1;");
        let four = b.int_lit_at("4");
        let n = b.local("N", Type::int(), "const int N = 4", Some(four));
        b.mark_const(n);
        let n_ref = b.var_ref_at(n, "N", 1);
        let n_load = b.load(n_ref);
        let two = b.int_lit_at("2");
        let mul = b.binary(BinaryOp::Mul, n_load, two);
        let one = b.int_lit_at("1");
        let sub = b.binary(BinaryOp::Sub, mul, one);
        let tree = b.finish().expect("tree builds").tree;
        assert_eq!(eval_int(&tree, sub), Some(7));
    }

    #[test]
    fn non_const_vars_do_not_fold() {
        let mut b = TreeBuilder::new("int n = 4; n;");
        let four = b.int_lit_at("4");
        let n = b.local("n", Type::int(), "int n = 4", Some(four));
        let n_ref = b.var_ref_at(n, "n", 1);
        let tree = b.finish().expect("tree builds").tree;
        assert_eq!(eval_int(&tree, n_ref), None);
    }

    #[test]
    fn division_by_zero_is_not_constant() {
        let mut b = TreeBuilder::new("1 / 0");
        let one = b.int_lit(1, Span::new(0, 1));
        let zero = b.int_lit(0, Span::new(4, 5));
        let div = b.binary(BinaryOp::Div, one, zero);
        let tree = b.finish().expect("tree builds").tree;
        assert_eq!(eval_int(&tree, div), None);
    }

    #[test]
    fn null_pointer_constants() {
        let mut b = TreeBuilder::new("nullptr 0 1");
        let null = b.null_ptr(Span::new(0, 7));
        let zero = b.int_lit(0, Span::new(8, 9));
        let zero_ptr = b.implicit_cast(
            CastKind::NullToPointer,
            zero,
            Type::pointer_to(Type::int()),
        );
        let one = b.int_lit(1, Span::new(10, 11));
        let tree = b.finish().expect("tree builds").tree;
        assert!(is_null_pointer_constant(&tree, null));
        assert!(is_null_pointer_constant(&tree, zero_ptr));
        assert!(!is_null_pointer_constant(&tree, one));
    }

    #[test]
    fn side_effects_are_found_in_subexpressions() {
        let mut b = TreeBuilder::new("int i; i + 1; i++ + 1;");
        let i = b.local("i", Type::int(), "int i", None);
        let i_ref = b.var_ref_at(i, "i", 1);
        let i_load = b.load(i_ref);
        let one = b.int_lit_at("1");
        let pure = b.binary(BinaryOp::Add, i_load, one);
        let i_ref2 = b.var_ref_at(i, "i", 2);
        let inc = b.unary(UnaryOp::PostInc, i_ref2);
        let one_again = b.int_lit_nth("1", 1);
        let effect = b.binary(BinaryOp::Add, inc, one_again);
        let tree = b.finish().expect("tree builds").tree;
        assert!(!has_side_effects(&tree, pure));
        assert!(has_side_effects(&tree, effect));
    }
}
