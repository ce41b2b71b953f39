//! Pointer uses that can be rewritten once their variable is retyped.

use crate::ast::eval::eval_int;
use crate::ast::{BinaryOp, DeclId, NodeId, NodeKind, SyntaxTree, TranslationUnit, UnaryOp};
use crate::fix::TextEdit;
use crate::strategy::{FixitStrategy, StrategyKind};

use super::context::{lvalue_context, pointer_context, untyped_context};
use super::{DeclUseList, has_pointer_or_array_type, is_decl_ref, supported_pointer_ref, supported_variable};

/// A recognized, rewritable use. `DeclRef` fields hold the claimed use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixableGadget {
    /// `p[i]` read or assigned.
    UlcArraySubscript { node: NodeId, base: Option<NodeId> },
    /// `*(p + 5)` read or assigned.
    DerefSimplePtrArith {
        deref: NodeId,
        add: NodeId,
        base: NodeId,
        offset: NodeId,
    },
    /// `*p` read or assigned.
    PointerDereference { op: NodeId, base: NodeId },
    /// `&p[i]` where only the pointer value is needed.
    UpcAddressofArraySubscript { node: NodeId, base: NodeId },
    /// `p` where only the pointer value is needed.
    UpcStandalonePointer { node: NodeId },
    /// `++p` where only the pointer value is needed.
    UpcPreIncrement { node: NodeId, base: NodeId },
    /// `p += n;` as a statement.
    UucAddAssign {
        node: NodeId,
        base: NodeId,
        offset: NodeId,
    },
    /// `p = q;` between pointer variables.
    PtrToPtrAssignment { lhs: NodeId, rhs: NodeId },
    /// `p = arr;` from a constant array.
    CArrayToPtrAssignment { lhs: NodeId, rhs: NodeId },
    /// `T *p = q;`
    PointerInit { lhs: DeclId, rhs: NodeId },
}

impl FixableGadget {
    /// Appends every fixable rooted at `id`, in catalog order.
    pub fn recognize_all(tree: &SyntaxTree, id: NodeId, out: &mut Vec<FixableGadget>) {
        if let Some(candidate) = lvalue_context(tree, id) {
            out.extend(match_ulc_array_subscript(tree, candidate));
            out.extend(match_deref_simple_ptr_arith(tree, candidate));
            out.extend(match_pointer_dereference(tree, candidate));
        }
        let pointer_uses = pointer_context(tree, id);
        for candidate in &pointer_uses {
            out.extend(match_upc_addressof_subscript(tree, *candidate));
        }
        for candidate in &pointer_uses {
            out.extend(match_upc_standalone_pointer(tree, *candidate));
        }
        for candidate in &pointer_uses {
            out.extend(match_upc_pre_increment(tree, *candidate));
        }
        let statements = untyped_context(tree, id);
        for stmt in &statements {
            out.extend(match_uuc_add_assign(tree, *stmt));
        }
        for stmt in &statements {
            out.extend(match_ptr_to_ptr_assignment(tree, *stmt));
        }
        for stmt in &statements {
            out.extend(match_carray_to_ptr_assignment(tree, *stmt));
        }
        out.extend(match_pointer_init(tree, id));
    }

    pub fn name(&self) -> &'static str {
        match self {
            FixableGadget::UlcArraySubscript { .. } => "ULCArraySubscript",
            FixableGadget::DerefSimplePtrArith { .. } => "DerefSimplePtrArith",
            FixableGadget::PointerDereference { .. } => "PointerDereference",
            FixableGadget::UpcAddressofArraySubscript { .. } => "UPCAddressofArraySubscript",
            FixableGadget::UpcStandalonePointer { .. } => "UPCStandalonePointer",
            FixableGadget::UpcPreIncrement { .. } => "UPCPreIncrement",
            FixableGadget::UucAddAssign { .. } => "UUCAddAssign",
            FixableGadget::PtrToPtrAssignment { .. } => "PtrToPtrAssignment",
            FixableGadget::CArrayToPtrAssignment { .. } => "CArrayToPtrAssignment",
            FixableGadget::PointerInit { .. } => "PointerInit",
        }
    }

    pub fn claimed_var_uses(&self) -> DeclUseList {
        match self {
            FixableGadget::UlcArraySubscript { base, .. } => base.iter().copied().collect(),
            FixableGadget::DerefSimplePtrArith { base, .. }
            | FixableGadget::PointerDereference { base, .. }
            | FixableGadget::UpcAddressofArraySubscript { base, .. }
            | FixableGadget::UpcPreIncrement { base, .. }
            | FixableGadget::UucAddAssign { base, .. } => vec![*base],
            FixableGadget::UpcStandalonePointer { node } => vec![*node],
            FixableGadget::PtrToPtrAssignment { lhs, rhs }
            | FixableGadget::CArrayToPtrAssignment { lhs, rhs } => vec![*lhs, *rhs],
            FixableGadget::PointerInit { rhs, .. } => vec![*rhs],
        }
    }

    /// `(a, b)`: fixing `a` requires fixing `b` the same way.
    pub fn strategy_implication(&self, tree: &SyntaxTree) -> Option<(DeclId, DeclId)> {
        match self {
            FixableGadget::PtrToPtrAssignment { lhs, rhs } => {
                Some((tree.referenced_decl(*lhs)?, tree.referenced_decl(*rhs)?))
            }
            FixableGadget::PointerInit { lhs, rhs } => Some((*lhs, tree.referenced_decl(*rhs)?)),
            _ => None,
        }
    }

    /// Node the gadget was recognized on, for traces.
    pub fn anchor(&self) -> NodeId {
        match self {
            FixableGadget::UlcArraySubscript { node, .. }
            | FixableGadget::UpcAddressofArraySubscript { node, .. }
            | FixableGadget::UpcStandalonePointer { node }
            | FixableGadget::UpcPreIncrement { node, .. }
            | FixableGadget::UucAddAssign { node, .. } => *node,
            FixableGadget::DerefSimplePtrArith { deref, .. } => *deref,
            FixableGadget::PointerDereference { op, .. } => *op,
            FixableGadget::PtrToPtrAssignment { lhs, .. }
            | FixableGadget::CArrayToPtrAssignment { lhs, .. } => *lhs,
            FixableGadget::PointerInit { rhs, .. } => *rhs,
        }
    }

    /// Edits rewriting this use under `strategy`; `None` when the use cannot
    /// be rewritten, an empty list when it stays valid as written.
    pub fn fixits(&self, tu: &TranslationUnit, strategy: &FixitStrategy) -> Option<Vec<TextEdit>> {
        let tree = &tu.tree;
        let kind_of = |dre: NodeId| {
            tree.referenced_decl(dre)
                .map(|var| strategy.lookup(var))
                .unwrap_or_default()
        };
        match self {
            FixableGadget::UlcArraySubscript { node, base } => {
                let base = (*base)?;
                let NodeKind::Subscript { index, .. } = tree.kind(*node)? else {
                    return None;
                };
                match kind_of(base) {
                    StrategyKind::Span if is_non_negative_integer(tree, *index) => Some(Vec::new()),
                    StrategyKind::Array => Some(Vec::new()),
                    _ => None,
                }
            }
            FixableGadget::DerefSimplePtrArith {
                deref,
                add,
                base,
                offset,
            } => {
                if kind_of(*base) != StrategyKind::Span {
                    return None;
                }
                if eval_int(tree, *offset).is_some_and(|value| value < 0) {
                    return None;
                }
                let NodeKind::Binary { lhs, rhs, .. } = tree.kind(*add)? else {
                    return None;
                };
                let NodeKind::Unary { op_span, .. } = tree.kind(*deref)? else {
                    return None;
                };
                let (lhs, rhs) = (tree.span(*lhs), tree.span(*rhs));
                Some(vec![
                    TextEdit::delete(op_span.start, lhs.start),
                    TextEdit::replace(lhs.end, rhs.start, "["),
                    TextEdit::replace(tree.span(*add).end, tree.span(*deref).end, "]"),
                ])
            }
            FixableGadget::PointerDereference { op, base } => match kind_of(*base) {
                StrategyKind::Span => {
                    let NodeKind::Unary { op_span, .. } = tree.kind(*op)? else {
                        return None;
                    };
                    Some(vec![
                        TextEdit::delete(op_span.start, op_span.start + 1),
                        TextEdit::insert(tree.span(*base).end, "[0]"),
                    ])
                }
                _ => None,
            },
            FixableGadget::UpcAddressofArraySubscript { node, base } => {
                if kind_of(*base) != StrategyKind::Span {
                    return None;
                }
                let NodeKind::Unary { operand, .. } = tree.kind(*node)? else {
                    return None;
                };
                let NodeKind::Subscript { index, .. } = tree.kind(*operand)? else {
                    return None;
                };
                let pointer = tu.text(tree.span(*base));
                let replacement = if eval_int(tree, *index) == Some(0) {
                    format!("{pointer}.data()")
                } else {
                    format!("&{pointer}.data()[{}]", tu.text(tree.span(*index)))
                };
                Some(vec![TextEdit::replace_span(tree.span(*node), replacement)])
            }
            FixableGadget::UpcStandalonePointer { node } => match kind_of(*node) {
                StrategyKind::Span | StrategyKind::Array => Some(data_fixit(tree, *node)),
                _ => None,
            },
            FixableGadget::UpcPreIncrement { node, base } => {
                if kind_of(*base) != StrategyKind::Span {
                    return None;
                }
                let (_, var) = tree.referenced_var(*base)?;
                let name = &var.name;
                Some(vec![TextEdit::replace_span(
                    tree.span(*node),
                    format!("({name} = {name}.subspan(1)).data()"),
                )])
            }
            FixableGadget::UucAddAssign { node, base, offset } => {
                if kind_of(*base) != StrategyKind::Span || !is_non_negative_integer(tree, *offset) {
                    return None;
                }
                let (_, var) = tree.referenced_var(*base)?;
                let name = &var.name;
                let offset_span = tree.span(*offset);
                let not_paren = tree.ignore_parens(*offset) == *offset;
                let mut head = format!("{name} = {name}.subspan");
                if not_paren {
                    head.push('(');
                }
                let mut edits = vec![TextEdit::replace(tree.span(*node).start, offset_span.start, head)];
                if not_paren {
                    edits.push(TextEdit::insert(offset_span.end, ")"));
                }
                Some(edits)
            }
            FixableGadget::PtrToPtrAssignment { lhs, rhs } => {
                match (kind_of(*lhs), kind_of(*rhs)) {
                    (StrategyKind::Span, StrategyKind::Span) => Some(Vec::new()),
                    _ => None,
                }
            }
            FixableGadget::CArrayToPtrAssignment { lhs, rhs } => {
                match (kind_of(*lhs), kind_of(*rhs)) {
                    (StrategyKind::Span, StrategyKind::Wontfix) => Some(Vec::new()),
                    (StrategyKind::Wontfix, StrategyKind::Array) => Some(data_fixit(tree, *rhs)),
                    _ => None,
                }
            }
            FixableGadget::PointerInit { lhs, rhs } => {
                match (strategy.lookup(*lhs), kind_of(*rhs)) {
                    (StrategyKind::Span, StrategyKind::Span) => Some(Vec::new()),
                    _ => None,
                }
            }
        }
    }
}

/// Non-negative constant, or an unsigned expression.
pub(crate) fn is_non_negative_integer(tree: &SyntaxTree, id: NodeId) -> bool {
    match eval_int(tree, id) {
        Some(value) => value >= 0,
        None => tree.ty(id).is_unsigned_integer(),
    }
}

fn data_fixit(tree: &SyntaxTree, dre: NodeId) -> Vec<TextEdit> {
    vec![TextEdit::insert(tree.span(dre).end, ".data()")]
}

fn match_ulc_array_subscript(tree: &SyntaxTree, candidate: NodeId) -> Option<FixableGadget> {
    let NodeKind::Subscript { base, .. } = tree.kind(candidate)? else {
        return None;
    };
    let stripped = tree.ignore_paren_imp_casts(*base);
    if !has_pointer_or_array_type(tree, stripped) {
        return None;
    }
    supported_variable(tree, stripped)?;
    let direct = tree.ignore_imp_casts(*base);
    Some(FixableGadget::UlcArraySubscript {
        node: candidate,
        base: is_decl_ref(tree, direct).then_some(direct),
    })
}

fn match_deref_simple_ptr_arith(tree: &SyntaxTree, candidate: NodeId) -> Option<FixableGadget> {
    let NodeKind::Unary {
        op: UnaryOp::Deref,
        operand,
        ..
    } = tree.kind(candidate)?
    else {
        return None;
    };
    let add = tree.ignore_parens(*operand);
    let NodeKind::Binary {
        op: BinaryOp::Add,
        lhs,
        rhs,
        ..
    } = tree.kind(add)?
    else {
        return None;
    };
    let is_literal = |id: NodeId| matches!(tree.kind(id), Some(NodeKind::IntegerLiteral { .. }));
    let pointer_side = |id: NodeId| {
        if !tree.ty(id).is_pointer() {
            return None;
        }
        let dre = tree.ignore_imp_casts(id);
        supported_variable(tree, dre).map(|_| dre)
    };
    let (base, offset) = if is_literal(*rhs) {
        (pointer_side(*lhs)?, *rhs)
    } else if is_literal(*lhs) {
        (pointer_side(*rhs)?, *lhs)
    } else {
        return None;
    };
    Some(FixableGadget::DerefSimplePtrArith {
        deref: candidate,
        add,
        base,
        offset,
    })
}

fn match_pointer_dereference(tree: &SyntaxTree, candidate: NodeId) -> Option<FixableGadget> {
    let NodeKind::Unary {
        op: UnaryOp::Deref,
        operand,
        ..
    } = tree.kind(candidate)?
    else {
        return None;
    };
    let base = tree.ignore_paren_imp_casts(*operand);
    supported_variable(tree, base)?;
    Some(FixableGadget::PointerDereference {
        op: candidate,
        base,
    })
}

fn match_upc_addressof_subscript(tree: &SyntaxTree, candidate: NodeId) -> Option<FixableGadget> {
    let node = tree.ignore_imp_casts(candidate);
    let NodeKind::Unary {
        op: UnaryOp::AddrOf,
        operand,
        ..
    } = tree.kind(node)?
    else {
        return None;
    };
    let NodeKind::Subscript { base, .. } = tree.kind(*operand)? else {
        return None;
    };
    let base = tree.ignore_paren_imp_casts(*base);
    supported_variable(tree, base)?;
    Some(FixableGadget::UpcAddressofArraySubscript { node, base })
}

fn match_upc_standalone_pointer(tree: &SyntaxTree, candidate: NodeId) -> Option<FixableGadget> {
    let node = tree.ignore_paren_imp_casts(candidate);
    if !has_pointer_or_array_type(tree, node) {
        return None;
    }
    supported_variable(tree, node)?;
    Some(FixableGadget::UpcStandalonePointer { node })
}

fn match_upc_pre_increment(tree: &SyntaxTree, candidate: NodeId) -> Option<FixableGadget> {
    let node = tree.ignore_imp_casts(candidate);
    let NodeKind::Unary {
        op: UnaryOp::PreInc,
        operand,
        ..
    } = tree.kind(node)?
    else {
        return None;
    };
    supported_variable(tree, *operand)?;
    Some(FixableGadget::UpcPreIncrement {
        node,
        base: *operand,
    })
}

fn match_uuc_add_assign(tree: &SyntaxTree, stmt: NodeId) -> Option<FixableGadget> {
    let node = tree.ignore_imp_casts(stmt);
    let NodeKind::Binary {
        op: BinaryOp::AddAssign,
        lhs,
        rhs,
        ..
    } = tree.kind(node)?
    else {
        return None;
    };
    supported_pointer_ref(tree, *lhs)?;
    Some(FixableGadget::UucAddAssign {
        node,
        base: *lhs,
        offset: *rhs,
    })
}

/// Plain `lhs = rhs` statement between a pointer variable and a variable
/// accepted by `rhs_ok`.
fn match_var_assignment(
    tree: &SyntaxTree,
    stmt: NodeId,
    rhs_ok: impl Fn(NodeId) -> bool,
) -> Option<(NodeId, NodeId)> {
    let NodeKind::Binary {
        op: BinaryOp::Assign,
        lhs,
        rhs,
        ..
    } = tree.kind(stmt)?
    else {
        return None;
    };
    let rhs = tree.ignore_paren_imp_casts(*rhs);
    if !rhs_ok(rhs) {
        return None;
    }
    supported_variable(tree, rhs)?;
    supported_pointer_ref(tree, *lhs)?;
    Some((*lhs, rhs))
}

fn match_ptr_to_ptr_assignment(tree: &SyntaxTree, stmt: NodeId) -> Option<FixableGadget> {
    let (lhs, rhs) = match_var_assignment(tree, stmt, |rhs| tree.ty(rhs).is_pointer())?;
    Some(FixableGadget::PtrToPtrAssignment { lhs, rhs })
}

fn match_carray_to_ptr_assignment(tree: &SyntaxTree, stmt: NodeId) -> Option<FixableGadget> {
    let (lhs, rhs) = match_var_assignment(tree, stmt, |rhs| {
        tree.ty(rhs).constant_array_size().is_some()
    })?;
    Some(FixableGadget::CArrayToPtrAssignment { lhs, rhs })
}

fn match_pointer_init(tree: &SyntaxTree, id: NodeId) -> Option<FixableGadget> {
    let NodeKind::DeclStmt { decls } = tree.kind(id)? else {
        return None;
    };
    let [lhs] = decls.as_slice() else {
        return None;
    };
    let init = tree.var(*lhs)?.init?;
    let rhs = tree.ignore_imp_casts(init);
    supported_pointer_ref(tree, rhs)?;
    Some(FixableGadget::PointerInit { lhs: *lhs, rhs })
}
