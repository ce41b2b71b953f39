//! Variable groups: sets of variables whose rewrites are applied together.
//!
//! Strategy implications (`p = q`, `T *p = q`) form a directed graph. Every
//! variable reachable from a warned variable is kept and linked to that
//! variable; connected components of the resulting undirected graph are the
//! groups. Groups holding a parameter of the analyzed function are also
//! merged into one parameter group, since changing a parameter's type means
//! changing the signature all of them share.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::ast::{DeclId, SyntaxTree};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableGroups {
    groups: Vec<Vec<DeclId>>,
    var_group: BTreeMap<DeclId, usize>,
    params: Vec<DeclId>,
}

impl VariableGroups {
    /// The group `var` belongs to and whether that is the parameter group.
    /// A variable in no group gets an empty slice.
    pub fn group_of_var(&self, var: DeclId) -> (&[DeclId], bool) {
        if self.params.contains(&var) {
            return (&self.params, true);
        }
        match self.var_group.get(&var) {
            Some(&index) => (&self.groups[index], false),
            None => (&[], false),
        }
    }

    /// Union of every group that holds a parameter of the analyzed function.
    pub fn group_of_params(&self) -> &[DeclId] {
        &self.params
    }

    pub fn groups(&self) -> &[Vec<DeclId>] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Result of [`group_variables`].
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    pub groups: VariableGroups,
    /// Variables reachable from a warned variable along implications.
    pub reachable: BTreeSet<DeclId>,
}

/// Groups the variables reachable from `warned` (in source order) over the
/// `(implied-by, implies)` pairs in `implications`.
pub fn group_variables(
    tree: &SyntaxTree,
    function: DeclId,
    warned: &[DeclId],
    implications: &[(DeclId, DeclId)],
) -> Grouping {
    let mut directed: BTreeMap<DeclId, Vec<DeclId>> = BTreeMap::new();
    for &(from, to) in implications {
        let targets = directed.entry(from).or_default();
        if !targets.contains(&to) {
            targets.push(to);
        }
    }

    let mut reachable = BTreeSet::new();
    let mut links: BTreeMap<DeclId, BTreeSet<DeclId>> = BTreeMap::new();
    for &root in warned {
        if reachable.contains(&root) {
            continue;
        }
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            reachable.insert(current);
            for &adjacent in directed.get(&current).into_iter().flatten() {
                if !reachable.contains(&adjacent) && !queue.contains(&adjacent) {
                    queue.push_back(adjacent);
                }
                links.entry(root).or_default().insert(adjacent);
                links.entry(adjacent).or_default().insert(root);
            }
        }
    }

    let is_param_of_function = |var: DeclId| {
        tree.var(var)
            .is_some_and(|decl| decl.is_parameter() && decl.owner == Some(function))
    };

    let mut groups = VariableGroups::default();
    let mut visited = BTreeSet::new();
    for &root in warned {
        if visited.contains(&root) {
            continue;
        }
        let mut members = Vec::new();
        let mut queue = VecDeque::from([root]);
        visited.insert(root);
        while let Some(current) = queue.pop_front() {
            members.push(current);
            for &adjacent in links.get(&current).into_iter().flatten() {
                if visited.insert(adjacent) {
                    queue.push_back(adjacent);
                }
            }
        }

        let index = groups.groups.len();
        for &member in &members {
            groups.var_group.insert(member, index);
        }
        if members.iter().any(|&member| is_param_of_function(member)) {
            for &member in &members {
                if !groups.params.contains(&member) {
                    groups.params.push(member);
                }
            }
        }
        groups.groups.push(members);
    }

    Grouping { groups, reachable }
}
