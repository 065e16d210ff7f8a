//! Ancestor and descendant indices over a [`DependencyMap`].
//!
//! # Direction
//!
//! - **Descendants** of X are what X depends on (`map[X]`, then transitively).
//! - **Ancestors** of X are the modules depending on X.
//!
//! # Deduplicated vs path-multiplicity queries
//!
//! [`DependencyIndex::find_descendants`] returns each reachable node once, in
//! breadth-first discovery order. [`DependencyIndex::find_all_descendants`]
//! keeps one copy per distinct path, so in the diamond
//! `1 → {2, 3}, 2 → 4, 3 → 4` node 4 appears twice. The multiplicity
//! variants are for diagnostics; nothing in activation depends on them.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

use indexmap::IndexMap;

use super::map::DependencyMap;

/// Immutable ancestor/descendant lookup built once per run.
#[derive(Debug, Clone)]
pub struct DependencyIndex<N: Eq + Hash> {
    ancestors: IndexMap<N, Vec<N>>,
    descendants: IndexMap<N, Vec<N>>,
}

impl<N: Clone + Eq + Hash> DependencyIndex<N> {
    /// Build both indices.
    ///
    /// Descendant lists are copied verbatim from the map. Ancestor lists are
    /// filled while walking the map in insertion order, so `ancestors(X)`
    /// lists dependents in the order their entries were declared. Every node
    /// mentioned in the map gets an entry in both indices.
    pub fn build(map: &DependencyMap<N>) -> Self {
        let nodes = map.nodes();
        let mut ancestors: IndexMap<N, Vec<N>> =
            nodes.iter().map(|n| (n.clone(), Vec::new())).collect();
        let mut descendants: IndexMap<N, Vec<N>> =
            nodes.into_iter().map(|n| (n, Vec::new())).collect();

        for (node, deps) in map {
            if let Some(slot) = descendants.get_mut(node) {
                slot.clone_from(deps);
            }
            for dep in deps {
                if let Some(slot) = ancestors.get_mut(dep) {
                    slot.push(node.clone());
                }
            }
        }

        Self {
            ancestors,
            descendants,
        }
    }

    /// Direct dependents of `node`. Empty for unknown nodes.
    pub fn ancestors(&self, node: &N) -> &[N] {
        self.ancestors.get(node).map_or(&[], Vec::as_slice)
    }

    /// Direct dependencies of `node`. Empty for unknown nodes.
    pub fn descendants(&self, node: &N) -> &[N] {
        self.descendants.get(node).map_or(&[], Vec::as_slice)
    }

    pub fn contains(&self, node: &N) -> bool {
        self.descendants.contains_key(node)
    }

    /// Every indexed node, first appearance first.
    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.descendants.keys()
    }

    pub fn node_count(&self) -> usize {
        self.descendants.len()
    }

    /// Transitive dependencies of `node`, each once, breadth-first.
    pub fn find_descendants(&self, node: &N) -> Vec<N> {
        closure(&self.descendants, node)
    }

    /// Transitive dependents of `node`, each once, breadth-first.
    pub fn find_ancestors(&self, node: &N) -> Vec<N> {
        closure(&self.ancestors, node)
    }

    /// Transitive dependencies of `node`, one copy per distinct path.
    pub fn find_all_descendants(&self, node: &N) -> Vec<N> {
        all_paths(&self.descendants, node)
    }

    /// Transitive dependents of `node`, one copy per distinct path.
    pub fn find_all_ancestors(&self, node: &N) -> Vec<N> {
        all_paths(&self.ancestors, node)
    }
}

/// Breadth-first closure visiting each node once. The start node is never
/// reported, even if a cycle leads back to it.
fn closure<N: Clone + Eq + Hash>(edges: &IndexMap<N, Vec<N>>, start: &N) -> Vec<N> {
    let mut seen: HashSet<&N> = HashSet::new();
    seen.insert(start);
    let mut queue: VecDeque<&N> = VecDeque::from([start]);
    let mut found = Vec::new();

    while let Some(current) = queue.pop_front() {
        for next in edges.get(current).into_iter().flatten() {
            if seen.insert(next) {
                found.push(next.clone());
                queue.push_back(next);
            }
        }
    }

    found
}

/// Breadth-first expansion without deduplication.
///
/// In an acyclic graph no path is longer than the node count, so expansion
/// stops at that depth; this only matters for cyclic input, which would
/// otherwise never terminate.
fn all_paths<N: Clone + Eq + Hash>(edges: &IndexMap<N, Vec<N>>, start: &N) -> Vec<N> {
    let max_depth = edges.len();
    let mut queue: VecDeque<(&N, usize)> = VecDeque::from([(start, 0)]);
    let mut found = Vec::new();

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for next in edges.get(current).into_iter().flatten() {
            found.push(next.clone());
            queue.push_back((next, depth + 1));
        }
    }

    found
}
