//! Gadgets: recognized code patterns.
//!
//! A warning gadget is an operation that is unsafe on raw pointers and gets
//! reported. A fixable gadget is a use of a pointer variable that stays
//! correct once the variable is rewritten to a bounds-carrying type, and
//! knows how to rewrite itself.

pub mod context;
pub mod fixable;
pub mod warning;

pub use fixable::FixableGadget;
pub use warning::WarningGadget;

use crate::ast::{DeclId, NodeId, NodeKind, Storage, SyntaxTree};

/// `DeclRef` nodes a gadget accounts for.
pub type DeclUseList = Vec<NodeId>;

/// The variable a `DeclRef` names, when the rewriting machinery can handle
/// it. Structured bindings cannot be retyped.
pub fn supported_variable(tree: &SyntaxTree, id: NodeId) -> Option<DeclId> {
    let (decl, var) = tree.referenced_var(id)?;
    (var.storage != Storage::Binding).then_some(decl)
}

pub(crate) fn is_decl_ref(tree: &SyntaxTree, id: NodeId) -> bool {
    matches!(tree.kind(id), Some(NodeKind::DeclRef { .. }))
}

pub(crate) fn has_pointer_type(tree: &SyntaxTree, id: NodeId) -> bool {
    tree.ty(id).is_pointer()
}

pub(crate) fn has_pointer_or_array_type(tree: &SyntaxTree, id: NodeId) -> bool {
    let ty = tree.ty(id);
    ty.is_pointer() || ty.is_array()
}

/// `DeclRef` to a supported variable whose type is a pointer.
pub(crate) fn supported_pointer_ref(tree: &SyntaxTree, id: NodeId) -> Option<DeclId> {
    if !has_pointer_type(tree, id) {
        return None;
    }
    supported_variable(tree, id)
}

/// The uses a gadget claims: `id` when it is a reference to a variable.
pub(crate) fn claim_if_var_ref(tree: &SyntaxTree, id: NodeId) -> DeclUseList {
    match tree.referenced_var(id) {
        Some(_) => vec![id],
        None => Vec::new(),
    }
}
