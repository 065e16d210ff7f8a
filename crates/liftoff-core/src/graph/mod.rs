//! Dependency graph algorithms.
//!
//! # Overview
//!
//! Everything here is generic over the node type so the algorithms can be
//! exercised with plain integers or strings; the orchestrator instantiates
//! them with [`crate::module::ModuleId`].
//!
//! ## Pipeline
//!
//! ```text
//! DependencyMap (node → direct deps, insertion ordered)
//!        ├─ index::DependencyIndex::build()  ancestors / descendants
//!        ├─ cycles::has_cycle()              reject loops up front
//!        └─ sort::topological_sort()         leaf-first SortedOrder
//! ```
//!
//! All three products are immutable once built and need no locking.
//!
//! ## Submodules
//!
//! - [`map`] — the insertion-ordered dependency map.
//! - [`index`] — ancestor/descendant indices, deduplicated and
//!   path-multiplicity closures.
//! - [`cycles`] — DFS cycle detection and cycle path reconstruction.
//! - [`sort`] — DFS-postorder topological sort.

pub mod cycles;
pub mod index;
pub mod map;
pub mod sort;

pub use cycles::{CyclePath, find_cycle, has_cycle};
pub use index::DependencyIndex;
pub use map::DependencyMap;
pub use sort::topological_sort;
