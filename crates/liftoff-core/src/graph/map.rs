//! Insertion-ordered `node → direct dependencies` map.

#![allow(clippy::must_use_candidate)]

use std::hash::Hash;

use indexmap::IndexMap;
use indexmap::map::Iter;

/// Direct dependencies per node, in declaration order.
///
/// Iteration follows insertion order, which is what makes the cycle check
/// and the sort deterministic. Nodes that only appear as a dependency need
/// not have an entry of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyMap<N: Eq + Hash> {
    entries: IndexMap<N, Vec<N>>,
}

impl<N: Eq + Hash> Default for DependencyMap<N> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<N: Clone + Eq + Hash> DependencyMap<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `node` with its direct dependencies, replacing any previous
    /// declaration while keeping the node's original position.
    pub fn insert(&mut self, node: N, dependencies: Vec<N>) -> Option<Vec<N>> {
        self.entries.insert(node, dependencies)
    }

    /// Direct dependencies of `node`, or `None` if it has no entry.
    pub fn dependencies(&self, node: &N) -> Option<&[N]> {
        self.entries.get(node).map(Vec::as_slice)
    }

    pub fn contains(&self, node: &N) -> bool {
        self.entries.contains_key(node)
    }

    /// Nodes with an entry, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &N> {
        self.entries.keys()
    }

    pub fn iter(&self) -> Iter<'_, N, Vec<N>> {
        self.entries.iter()
    }

    /// Every node mentioned anywhere, first appearance first: keys in
    /// insertion order, each followed by its not-yet-seen dependencies.
    pub fn nodes(&self) -> Vec<N> {
        let mut seen: IndexMap<&N, ()> = IndexMap::new();
        for (node, deps) in &self.entries {
            seen.entry(node).or_insert(());
            for dep in deps {
                seen.entry(dep).or_insert(());
            }
        }
        seen.into_keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl<N: Clone + Eq + Hash> FromIterator<(N, Vec<N>)> for DependencyMap<N> {
    fn from_iter<I: IntoIterator<Item = (N, Vec<N>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a, N: Eq + Hash> IntoIterator for &'a DependencyMap<N> {
    type Item = (&'a N, &'a Vec<N>);
    type IntoIter = Iter<'a, N, Vec<N>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
