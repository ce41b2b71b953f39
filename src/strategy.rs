//! Per-variable choice of replacement type.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::ast::{DeclId, SyntaxTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Leave the variable alone.
    #[default]
    Wontfix,
    /// Retype a pointer as `std::span<T>`.
    Span,
    /// Reserved; never chosen.
    Iterator,
    /// Retype a C array as `std::array<T, N>`.
    Array,
    /// Reserved; never chosen.
    Vector,
}

impl StrategyKind {
    /// Name of the replacement type, as shown in fix notes.
    pub fn type_name(self) -> &'static str {
        match self {
            StrategyKind::Wontfix => "",
            StrategyKind::Span => "std::span",
            StrategyKind::Iterator => "std::span::iterator",
            StrategyKind::Array => "std::array",
            StrategyKind::Vector => "std::vector",
        }
    }
}

/// Strategy map; variables without an entry are [`StrategyKind::Wontfix`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixitStrategy {
    map: BTreeMap<DeclId, StrategyKind>,
}

impl FixitStrategy {
    pub fn set(&mut self, var: DeclId, kind: StrategyKind) {
        self.map.insert(var, kind);
    }

    pub fn lookup(&self, var: DeclId) -> StrategyKind {
        self.map.get(&var).copied().unwrap_or_default()
    }
}

/// Constant arrays become `std::array`; every other variable becomes
/// `std::span`.
pub fn naive_strategy(tree: &SyntaxTree, vars: impl IntoIterator<Item = DeclId>) -> FixitStrategy {
    let mut strategy = FixitStrategy::default();
    for var in vars {
        let is_constant_array = tree
            .var(var)
            .is_some_and(|decl| decl.ty.constant_array_size().is_some());
        let kind = if is_constant_array {
            StrategyKind::Array
        } else {
            StrategyKind::Span
        };
        strategy.set(var, kind);
    }
    strategy
}
