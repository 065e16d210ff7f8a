//! Cycle detection for module dependency maps.
//!
//! # Overview
//!
//! A dependency cycle makes a startup order impossible: every module in the
//! loop waits on another one in the loop. The orchestrator checks the
//! resolved map before anything is instantiated and refuses to run if a loop
//! exists.
//!
//! # Design
//!
//! - **DFS with an on-path set**: `visited` holds every node seen so far,
//!   `on_path` holds the current DFS path. Reaching a node that is
//!   still on the path is a back edge, hence a cycle.
//! - **All keys are roots**: a map can hold disconnected clusters, so every
//!   key starts a walk unless an earlier walk already covered it.
//! - **O(V+E)**: fully explored nodes leave `on_path` but stay in `visited`
//!   and are never walked again.
//!
//! # Usage
//!
//! ```rust,ignore
//! use liftoff_core::graph::cycles::{find_cycle, has_cycle};
//!
//! if has_cycle(&map) {
//!     let cycle = find_cycle(&map).expect("cycle present");
//!     eprintln!("refusing to start: {cycle}");
//! }
//! ```

#![allow(
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::missing_const_for_fn
)]

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

use super::map::DependencyMap;

// ---------------------------------------------------------------------------
// CyclePath
// ---------------------------------------------------------------------------

/// A dependency loop found in a map.
///
/// `path` starts and ends at the same node and follows dependency edges. If
/// A depends on B, B on C and C on A, the path is `[A, B, C, A]` and the
/// closing edge is `C → A`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath<N> {
    /// Nodes in loop order, first node repeated at the end.
    pub path: Vec<N>,
    /// Dependent side of the edge that closes the loop.
    pub edge_from: N,
    /// Dependency side of the edge that closes the loop.
    pub edge_to: N,
}

impl<N: PartialEq> CyclePath<N> {
    /// Number of distinct nodes in the loop.
    pub fn len(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` when a node depends on itself.
    pub fn is_self_loop(&self) -> bool {
        self.edge_from == self.edge_to
    }

    /// `true` for a two-node loop (A ↔ B).
    pub fn is_mutual(&self) -> bool {
        self.len() == 2
    }
}

impl<N: fmt::Display + PartialEq> fmt::Display for CyclePath<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_self_loop() {
            write!(f, "cycle detected: '{}' depends on itself", self.edge_from)
        } else if self.is_mutual() {
            write!(
                f,
                "cycle detected: '{}' and '{}' depend on each other",
                self.edge_from, self.edge_to
            )
        } else {
            let joined = self
                .path
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" → ");
            write!(f, "cycle detected ({} modules): {joined}", self.len())
        }
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Whether `map` contains a directed cycle.
///
/// Short-circuits on the first back edge. Does not allocate beyond the two
/// traversal sets.
pub fn has_cycle<N: Clone + Eq + Hash>(map: &DependencyMap<N>) -> bool {
    let mut walk = Walk::new(map);
    map.keys().any(|node| walk.start(node).is_some())
}

/// The first cycle encountered, walking keys in insertion order.
pub fn find_cycle<N: Clone + Eq + Hash>(map: &DependencyMap<N>) -> Option<CyclePath<N>> {
    let mut walk = Walk::new(map);
    map.keys().find_map(|node| walk.start(node))
}

/// Shared DFS state. `stack` mirrors `on_path` in order so the loop can be
/// read back off it when a back edge shows up. The walk keeps its own frames
/// instead of recursing, so chain depth is bounded by memory, not the thread
/// stack.
struct Walk<'a, N: Eq + Hash> {
    map: &'a DependencyMap<N>,
    visited: HashSet<&'a N>,
    on_path: HashSet<&'a N>,
    stack: Vec<&'a N>,
    // Each frame: (dependencies of the node at the same `stack` depth,
    // index of the next one to visit).
    frames: Vec<(&'a [N], usize)>,
}

impl<'a, N: Clone + Eq + Hash> Walk<'a, N> {
    fn new(map: &'a DependencyMap<N>) -> Self {
        Self {
            map,
            visited: HashSet::new(),
            on_path: HashSet::new(),
            stack: Vec::new(),
            frames: Vec::new(),
        }
    }

    fn start(&mut self, node: &'a N) -> Option<CyclePath<N>> {
        if self.visited.contains(node) {
            return None;
        }
        self.enter(node);

        while let Some(frame) = self.frames.last_mut() {
            let (deps, idx) = (frame.0, &mut frame.1);
            let Some(dep) = deps.get(*idx) else {
                self.frames.pop();
                if let Some(done) = self.stack.pop() {
                    self.on_path.remove(done);
                }
                continue;
            };
            *idx += 1;

            if self.on_path.contains(dep) {
                let node = self.stack.last().copied().unwrap_or(dep);
                let cycle = self.close(node, dep);
                self.unwind();
                return Some(cycle);
            }
            if !self.visited.contains(dep) {
                self.enter(dep);
            }
        }
        None
    }

    fn enter(&mut self, node: &'a N) {
        self.visited.insert(node);
        self.on_path.insert(node);
        self.stack.push(node);
        self.frames
            .push((self.map.dependencies(node).unwrap_or_default(), 0));
    }

    /// Drop the in-progress path after an early exit.
    fn unwind(&mut self) {
        self.frames.clear();
        self.stack.clear();
        self.on_path.clear();
    }

    /// Build the loop `dep → … → node → dep` from the current stack.
    fn close(&self, node: &N, dep: &N) -> CyclePath<N> {
        let start = self
            .stack
            .iter()
            .rposition(|n| *n == dep)
            .unwrap_or_default();
        let mut path: Vec<N> = self.stack[start..].iter().map(|n| (*n).clone()).collect();
        path.push(dep.clone());

        CyclePath {
            path,
            edge_from: node.clone(),
            edge_to: dep.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
