//! Leaf-first topological sort.
//!
//! DFS postorder: keys are taken in map order, each node's dependencies are
//! visited in declared order, and a node is appended only after all of its
//! dependencies. The result never places a module before something it
//! depends on.
//!
//! The sort does not reject cycles. A visited-set check stops it from
//! walking forever, but on cyclic input the output is not a valid order;
//! run [`super::cycles::has_cycle`] first when correctness matters.

#![allow(clippy::must_use_candidate)]

use std::collections::HashSet;
use std::hash::Hash;

use super::map::DependencyMap;

/// Sort `map` so dependencies come before dependents.
///
/// Deterministic: equal maps with equal insertion and declaration order
/// always produce the same sequence. Every node mentioned in the map,
/// including dependency-only leaves, appears exactly once.
pub fn topological_sort<N: Clone + Eq + Hash>(map: &DependencyMap<N>) -> Vec<N> {
    let mut visited: HashSet<&N> = HashSet::new();
    let mut order = Vec::with_capacity(map.len());
    // Each frame: (node, its dependencies, index of the next one to visit).
    let mut frames: Vec<(&N, &[N], usize)> = Vec::new();

    for root in map.keys() {
        if !visited.insert(root) {
            continue;
        }
        frames.push((root, map.dependencies(root).unwrap_or_default(), 0));

        while let Some(frame) = frames.last_mut() {
            let (node, deps, idx) = (frame.0, frame.1, &mut frame.2);
            if let Some(dep) = deps.get(*idx) {
                *idx += 1;
                if visited.insert(dep) {
                    frames.push((dep, map.dependencies(dep).unwrap_or_default(), 0));
                }
            } else {
                // Postorder: every dependency is already in `order`.
                frames.pop();
                order.push(node.clone());
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position<N: PartialEq>(order: &[N], node: &N) -> usize {
        order
            .iter()
            .position(|n| n == node)
            .expect("node present in order")
    }

    #[test]
    fn empty_map_sorts_to_nothing() {
        let map: DependencyMap<u32> = DependencyMap::new();
        assert!(topological_sort(&map).is_empty());
    }

    #[test]
    fn chain_is_leaf_first() {
        let map: DependencyMap<&str> = [("A", vec!["B"]), ("B", vec!["C"]), ("C", vec!["D"])]
            .into_iter()
            .collect();
        assert_eq!(topological_sort(&map), vec!["D", "C", "B", "A"]);
    }

    #[test]
    fn diamond_respects_every_edge() {
        let map: DependencyMap<u32> = [(1, vec![2, 3]), (2, vec![4, 5]), (3, vec![4, 6])]
            .into_iter()
            .collect();
        let order = topological_sort(&map);
        assert_eq!(order, vec![4, 5, 2, 6, 3, 1]);
        for (node, deps) in &map {
            for dep in deps {
                assert!(position(&order, dep) < position(&order, node), "{dep} before {node}");
            }
        }
    }

    #[test]
    fn shared_dependencies_appear_once() {
        let map: DependencyMap<&str> = [("A", vec!["C"]), ("B", vec!["C"])].into_iter().collect();
        assert_eq!(topological_sort(&map), vec!["C", "A", "B"]);
    }

    #[test]
    fn sort_is_deterministic() {
        let build = || -> DependencyMap<u32> {
            [(5, vec![3, 1]), (3, vec![1, 2]), (9, vec![])].into_iter().collect()
        };
        let first = topological_sort(&build());
        for _ in 0..10 {
            assert_eq!(topological_sort(&build()), first);
        }
    }

    #[test]
    fn deep_chain_sorts_without_recursion() {
        let n = 200_000_u32;
        let map: DependencyMap<u32> = (0..n).map(|i| (i, vec![i + 1])).collect();
        let order = topological_sort(&map);
        assert_eq!(order.len(), n as usize + 1);
        assert_eq!(order.first(), Some(&n));
        assert_eq!(order.last(), Some(&0));
    }

    #[test]
    fn cyclic_input_terminates() {
        let map: DependencyMap<&str> = [("A", vec!["B"]), ("B", vec!["A"])].into_iter().collect();
        let order = topological_sort(&map);
        assert_eq!(order.len(), 2);
    }
}
