//! Scoped pre-order traversal of a callable's statements.
//!
//! The walk stays inside the callable it starts from: block literals are
//! analyzed as callables of their own and are not entered, while lambda
//! bodies are walked with the enclosing function.

use crate::ast::{NodeId, NodeKind, SyntaxTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Keep walking after the first successful match.
    pub find_all: bool,
    /// Do not descend into `sizeof`-like operands or unselected
    /// `_Generic` associations.
    pub skip_unevaluated: bool,
}

impl MatchOptions {
    pub const WARNINGS: MatchOptions = MatchOptions {
        find_all: true,
        skip_unevaluated: true,
    };

    pub const FIXABLES: MatchOptions = MatchOptions {
        find_all: true,
        skip_unevaluated: false,
    };
}

/// Children the walk descends into under `options`.
fn scoped_children(tree: &SyntaxTree, id: NodeId, options: MatchOptions) -> Vec<NodeId> {
    match tree.kind(id) {
        None | Some(NodeKind::BlockExpr { .. }) => Vec::new(),
        Some(NodeKind::Unevaluated { .. }) if options.skip_unevaluated => Vec::new(),
        Some(NodeKind::GenericSelection { result, .. }) if options.skip_unevaluated => {
            vec![*result]
        }
        Some(_) => tree.children(id),
    }
}

/// Calls `on_node` on `root` and every node below it, parents before their
/// children and siblings in evaluation order. `on_node` returns whether the
/// node matched; without `find_all` the walk stops at the first match.
///
/// Returns whether anything matched.
pub fn walk_descendants<F>(tree: &SyntaxTree, root: NodeId, options: MatchOptions, mut on_node: F) -> bool
where
    F: FnMut(NodeId) -> bool,
{
    let mut matched = false;
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if on_node(id) {
            matched = true;
            if !options.find_all {
                return true;
            }
        }
        let children = scoped_children(tree, id, options);
        stack.extend(children.into_iter().rev());
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{TreeBuilder, Type, UnevaluatedKind};

    #[test]
    fn walk_is_preorder() {
        let mut b = TreeBuilder::new("void f() { 1; 2; }");
        let f = b.function("f", "void f()");
        let one = b.int_lit_at("1");
        let two = b.int_lit_at("2");
        let open = b.find("{");
        let body = b.block_at(vec![one, two], open);
        b.set_body(f, body);
        let tu = b.finish().expect("builds");

        let mut seen = Vec::new();
        walk_descendants(&tu.tree, body, MatchOptions::WARNINGS, |id| {
            seen.push(id);
            false
        });
        assert_eq!(seen, vec![body, one, two]);
    }

    #[test]
    fn unevaluated_operands_are_skipped_on_request() {
        let mut b = TreeBuilder::new("void f(int *p) { sizeof(p[1]); }");
        let f = b.function("f", "void f(int *p)");
        let p = b.param(f, "p", Type::pointer_to(Type::int()), "int *p");
        let p_ref = b.var_ref_at(p, "p", 1);
        let load = b.load(p_ref);
        let one = b.int_lit_at("1");
        let sub = b.subscript(load, one);
        let span = b.find("sizeof(p[1])");
        let size = b.unevaluated(UnevaluatedKind::Sizeof, Some(sub), None, span);
        let open = b.find("{");
        let body = b.block_at(vec![size], open);
        b.set_body(f, body);
        let tu = b.finish().expect("builds");

        let mut hits = 0;
        walk_descendants(&tu.tree, body, MatchOptions::WARNINGS, |id| {
            if id == sub {
                hits += 1;
            }
            false
        });
        assert_eq!(hits, 0);
        walk_descendants(&tu.tree, body, MatchOptions::FIXABLES, |id| {
            if id == sub {
                hits += 1;
            }
            false
        });
        assert_eq!(hits, 1);
    }

    #[test]
    fn first_match_stops_the_walk() {
        let mut b = TreeBuilder::new("void f() { 1; 2; }");
        let f = b.function("f", "void f()");
        let one = b.int_lit_at("1");
        let two = b.int_lit_at("2");
        let open = b.find("{");
        let body = b.block_at(vec![one, two], open);
        b.set_body(f, body);
        let tu = b.finish().expect("builds");

        let options = MatchOptions {
            find_all: false,
            skip_unevaluated: true,
        };
        let mut visited = 0;
        let matched = walk_descendants(&tu.tree, body, options, |id| {
            visited += 1;
            id == one
        });
        assert!(matched);
        assert_eq!(visited, 2);
    }
}
