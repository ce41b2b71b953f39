//! Bookkeeping of pointer variable uses that gadgets account for.
//!
//! Every pointer- or array-typed reference to a variable is discovered
//! during the fixable pass. Gadgets then claim the uses they understand;
//! a variable with any use left unclaimed cannot be rewritten safely.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{DeclId, NodeId, NodeKind, SyntaxTree};

#[derive(Debug, Default)]
pub struct DeclUseTracker {
    unclaimed: BTreeSet<NodeId>,
    owners: BTreeMap<NodeId, DeclId>,
    defs: BTreeMap<DeclId, NodeId>,
}

impl DeclUseTracker {
    /// Records `id` when it is a use or declaration the tracker cares about.
    pub fn observe(&mut self, tree: &SyntaxTree, id: NodeId) {
        match tree.kind(id) {
            Some(NodeKind::DeclRef { decl }) => {
                let ty = tree.ty(id);
                if (ty.is_pointer() || ty.is_array()) && tree.var(*decl).is_some() {
                    self.discover_use(*decl, id);
                }
            }
            Some(NodeKind::DeclStmt { decls }) => {
                for decl in decls {
                    if tree.var(*decl).is_some() {
                        self.discover_decl(*decl, id);
                    }
                }
            }
            _ => {}
        }
    }

    pub fn discover_use(&mut self, var: DeclId, dre: NodeId) {
        self.unclaimed.insert(dre);
        self.owners.insert(dre, var);
    }

    pub fn discover_decl(&mut self, var: DeclId, stmt: NodeId) {
        self.defs.entry(var).or_insert(stmt);
    }

    /// Removes `dre` from the unclaimed set. Claiming an unknown or
    /// already-claimed use is a no-op.
    pub fn claim_use(&mut self, dre: NodeId) {
        self.unclaimed.remove(&dre);
    }

    pub fn has_unclaimed_uses(&self, var: DeclId) -> bool {
        self.unclaimed
            .iter()
            .any(|dre| self.owners.get(dre) == Some(&var))
    }

    pub fn unclaimed_uses(&self, var: DeclId) -> Vec<NodeId> {
        self.unclaimed
            .iter()
            .filter(|dre| self.owners.get(dre) == Some(&var))
            .copied()
            .collect()
    }

    /// Declaration statement introducing `var`, if it was seen.
    pub fn lookup_decl(&self, var: DeclId) -> Option<NodeId> {
        self.defs.get(&var).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claiming_is_idempotent() {
        let mut tracker = DeclUseTracker::default();
        tracker.discover_use(DeclId(1), NodeId(10));
        tracker.discover_use(DeclId(1), NodeId(11));
        tracker.discover_use(DeclId(2), NodeId(12));

        tracker.claim_use(NodeId(10));
        tracker.claim_use(NodeId(10));
        tracker.claim_use(NodeId(99));
        assert!(tracker.has_unclaimed_uses(DeclId(1)));
        assert_eq!(tracker.unclaimed_uses(DeclId(1)), vec![NodeId(11)]);

        tracker.claim_use(NodeId(11));
        assert!(!tracker.has_unclaimed_uses(DeclId(1)));
        assert!(tracker.has_unclaimed_uses(DeclId(2)));
    }

    #[test]
    fn first_declaration_statement_wins() {
        let mut tracker = DeclUseTracker::default();
        tracker.discover_decl(DeclId(3), NodeId(4));
        tracker.discover_decl(DeclId(3), NodeId(8));
        assert_eq!(tracker.lookup_decl(DeclId(3)), Some(NodeId(4)));
        assert_eq!(tracker.lookup_decl(DeclId(5)), None);
    }
}
