//! Safety oracles: predicates proving an operation stays in bounds.
//!
//! Every oracle answers "provably safe" or "unproven". Unproven operations
//! are treated as unsafe by the gadgets, never the other way around.

use crate::ast::eval::eval_int;
use crate::ast::{BinaryOp, CastStyle, NodeId, NodeKind, SyntaxTree, Type, UnaryOp};

/// Structural integer equality: equal constants, references to the same
/// declaration, or commutative `+`/`*` of pairwise-equal operands.
pub fn integers_equal(tree: &SyntaxTree, e1: NodeId, e2: NodeId) -> bool {
    let e1 = tree.ignore_paren_imp_casts(e1);
    let e2 = tree.ignore_paren_imp_casts(e2);
    let ty = tree.ty(e1);
    if !ty.is_integer() || ty != tree.ty(e2) {
        return false;
    }
    if let (Some(v1), Some(v2)) = (eval_int(tree, e1), eval_int(tree, e2)) {
        return v1 == v2;
    }
    match (tree.kind(e1), tree.kind(e2)) {
        (Some(NodeKind::DeclRef { decl: d1 }), Some(NodeKind::DeclRef { decl: d2 })) => d1 == d2,
        (Some(NodeKind::Binary { .. }), Some(NodeKind::Binary { op, lhs, rhs, .. })) => {
            binary_operands_equal(tree, e1, *lhs, *op, *rhs)
        }
        _ => false,
    }
}

/// `bin` is `op` applied to operands equal to `lhs` and `rhs`, in either
/// order. Only `+` and `*` are accepted.
fn binary_operands_equal(
    tree: &SyntaxTree,
    bin: NodeId,
    lhs: NodeId,
    op: BinaryOp,
    rhs: NodeId,
) -> bool {
    let Some(NodeKind::Binary {
        op: bin_op,
        lhs: bin_lhs,
        rhs: bin_rhs,
        ..
    }) = tree.kind(bin)
    else {
        return false;
    };
    if *bin_op != op || !matches!(op, BinaryOp::Mul | BinaryOp::Add) {
        return false;
    }
    (integers_equal(tree, *bin_lhs, lhs) && integers_equal(tree, *bin_rhs, rhs))
        || (integers_equal(tree, *bin_lhs, rhs) && integers_equal(tree, *bin_rhs, lhs))
}

fn same_decl_ref(tree: &SyntaxTree, e0: NodeId, e1: NodeId) -> bool {
    match (tree.referenced_decl(e0), tree.referenced_decl(e1)) {
        (Some(d0), Some(d1)) => d0 == d1,
        _ => false,
    }
}

/// Object a member call is made on, if it is a plain variable reference.
fn member_call_object(tree: &SyntaxTree, call: NodeId) -> Option<NodeId> {
    match tree.kind(call)? {
        NodeKind::MemberCall { object, .. } => Some(tree.ignore_paren_imp_casts(*object)),
        _ => None,
    }
}

/// `x.method()` where `x` is one of the sized standard containers or views.
fn is_sized_container_call(tree: &SyntaxTree, call: NodeId, method_name: &str) -> bool {
    match tree.kind(call) {
        Some(NodeKind::MemberCall {
            method,
            record: Some(record),
            ..
        }) => record.is_sized_container_or_view() && method == method_name,
        _ => false,
    }
}

/// True iff (`ptr`, `size`) provably describe the same buffer:
///
/// 1. `c.data()` with `c.size()` (or `c.size_bytes()` for char pointers) on
///    the same sized container or view;
/// 2. a constant-size array `a` with its exact element count;
/// 3. `&x` or `std::addressof(x)` with size `1`;
/// 4. any pointer with size `0`.
pub fn ptr_buffer_is_safe(tree: &SyntaxTree, ptr: NodeId, size: NodeId) -> bool {
    let ptr_inner = tree.ignore_paren_imp_casts(ptr);
    let size_inner = tree.ignore_paren_imp_casts(size);

    if let (
        Some(NodeKind::MemberCall {
            object: ptr_obj,
            method: ptr_method,
            record,
            ..
        }),
        Some(NodeKind::MemberCall {
            object: size_obj,
            method: size_method,
            ..
        }),
    ) = (tree.kind(ptr_inner), tree.kind(size_inner))
    {
        let ptr_obj = tree.ignore_paren_imp_casts(*ptr_obj);
        let size_obj = tree.ignore_paren_imp_casts(*size_obj);
        if !same_decl_ref(tree, ptr_obj, size_obj) || ptr_method != "data" {
            return false;
        }
        let Some(record) = record else {
            return false;
        };
        if !record.in_std {
            return false;
        }
        let accepts_size_bytes = tree.ty(ptr).pointee().is_some_and(|t| t.is_char());
        if !(size_method == "size" || (accepts_size_bytes && size_method == "size_bytes")) {
            return false;
        }
        return record.is_sized_container_or_view();
    }

    match eval_int(tree, size) {
        Some(size_value) => ptr_buffer_fits_constant(tree, ptr, size_value),
        None => false,
    }
}

/// Patterns 2 to 4 of [`ptr_buffer_is_safe`] for a size known up front,
/// such as the precision of a `%.8s` conversion.
pub fn ptr_buffer_fits_constant(tree: &SyntaxTree, ptr: NodeId, size_value: i128) -> bool {
    if size_value == 0 {
        return true;
    }
    let ptr_inner = tree.ignore_paren_imp_casts(ptr);
    match tree.kind(ptr_inner) {
        Some(NodeKind::DeclRef { .. }) => tree
            .ty(ptr_inner)
            .constant_array_size()
            .is_some_and(|n| i128::from(n) == size_value),
        Some(NodeKind::Unary {
            op: UnaryOp::AddrOf,
            ..
        }) => size_value == 1,
        Some(NodeKind::Call {
            callee: Some(callee),
            ..
        }) if size_value == 1 => tree
            .function(*callee)
            .is_some_and(|f| f.name == "addressof" && f.in_std),
        _ => false,
    }
}

/// Safety of a two-argument bounded-view construction `span(arg0, arg1)`.
pub fn span_two_arg_construct_is_safe(tree: &SyntaxTree, arg0: NodeId, arg1: NodeId) -> bool {
    let arg0 = tree.ignore_paren_imp_casts(arg0);
    let arg1 = tree.ignore_paren_imp_casts(arg1);
    let arg1_value = eval_int(tree, arg1);

    if arg1_value == Some(0) {
        return true;
    }

    if let Some(NodeKind::New { array_size, .. }) = tree.kind(arg0) {
        return match array_size {
            Some(size) => {
                same_decl_ref(tree, tree.ignore_imp_casts(*size), arg1)
                    || matches!(
                        (eval_int(tree, *size), arg1_value),
                        (Some(a), Some(b)) if a == b
                    )
            }
            None => arg1_value == Some(1),
        };
    }

    if let Some(NodeKind::ExplicitCast {
        style: CastStyle::CStyle,
        inner,
        ..
    }) = tree.kind(arg0)
    {
        let cast_ty = tree.ty(arg0);
        let Some(pointee) = cast_ty.pointee() else {
            return false;
        };
        if pointee.size_in_chars() != Some(1) {
            return false;
        }
        if alloc_size_matches(tree, *inner, arg1) {
            return true;
        }
    }

    if is_sized_container_call(tree, arg0, "begin") && is_sized_container_call(tree, arg1, "end")
    {
        return match (member_call_object(tree, arg0), member_call_object(tree, arg1)) {
            (Some(o0), Some(o1)) => same_decl_ref(tree, o0, o1),
            _ => false,
        };
    }

    ptr_buffer_is_safe(tree, arg0, arg1)
}

/// `call` allocates through an `alloc_size` contract whose size is `size`.
fn alloc_size_matches(tree: &SyntaxTree, call: NodeId, size: NodeId) -> bool {
    let Some(NodeKind::Call {
        callee: Some(callee),
        args,
        ..
    }) = tree.kind(call)
    else {
        return false;
    };
    let Some(alloc) = tree.function(*callee).and_then(|f| f.alloc_size) else {
        return false;
    };
    let Some(&elem_size) = args.get(alloc.elem_size_param) else {
        return false;
    };
    match alloc.num_elems_param {
        None => integers_equal(tree, size, elem_size),
        Some(index) => match args.get(index) {
            Some(&num_elems) => {
                binary_operands_equal(tree, size, num_elems, BinaryOp::Mul, elem_size)
            }
            None => false,
        },
    }
}

/// Code units in a literal without its terminator: bytes for narrow
/// strings, characters for wide ones.
fn string_literal_units(ty: &Type, value: &str) -> usize {
    let element = ty.element().or_else(|| ty.pointee());
    if element.is_some_and(Type::is_wide_char) {
        value.chars().count()
    } else {
        value.len()
    }
}

/// Proves `base[index]` in bounds for constant arrays and string literals.
pub fn array_subscript_is_safe(tree: &SyntaxTree, base: NodeId, index: NodeId) -> bool {
    let base_inner = tree.ignore_paren_imp_casts(base);
    let limit: i128 = match (tree.ty(base_inner).constant_array_size(), tree.kind(base_inner)) {
        (Some(size), _) => i128::from(size),
        (None, Some(NodeKind::StringLiteral { value })) => {
            string_literal_units(tree.ty(base_inner), value) as i128 + 1
        }
        _ => return false,
    };

    if let Some(value) = eval_int(tree, index) {
        return (0..limit).contains(&value);
    }

    let Some(NodeKind::Binary { op, lhs, rhs, .. }) = tree.kind(index) else {
        return false;
    };
    match op {
        BinaryOp::Rem => {
            if !tree.ty(*lhs).is_unsigned_integer() {
                return false;
            }
            eval_int(tree, *rhs).is_some_and(|n| n >= 0 && n <= limit)
        }
        BinaryOp::And => eval_int(tree, *lhs)
            .or_else(|| eval_int(tree, *rhs))
            .is_some_and(|n| (0..limit).contains(&n)),
        _ => false,
    }
}

/// String literals, `__func__`-style identifiers and `std::string::c_str()`.
pub fn is_null_terminated(tree: &SyntaxTree, ptr: NodeId) -> bool {
    let inner = tree.ignore_paren_imp_casts(ptr);
    match tree.kind(inner) {
        Some(NodeKind::StringLiteral { .. } | NodeKind::Predefined) => true,
        Some(NodeKind::MemberCall {
            method,
            record: Some(record),
            ..
        }) => method == "c_str" && record.in_std && record.name == "basic_string",
        _ => false,
    }
}
