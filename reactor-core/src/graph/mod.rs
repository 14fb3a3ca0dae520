//! Dependency Graph
//!
//! This module tracks which components must re-render when something changes.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph where:
//!
//! - Nodes are external sources (store collections) or component instances
//! - Edges point from a dependency to its dependent:
//!   - `source -> component` for each collection a component declared a read on
//!   - `child -> parent` for composition declared at join time
//!
//! When a handler writes a collection, or a component's output changes, we
//! traverse the graph to find every affected component and re-render them in
//! dependency order.
//!
//! # Design Decisions
//!
//! 1. One graph per session, owned by the session's runtime. Sessions share
//!    nothing but the store.
//!
//! 2. The graph is indexed by node id, and edge sets keep insertion order so
//!    re-render order is deterministic.
//!
//! 3. We maintain both forward (dependencies) and reverse (dependents) edges
//!    to enable efficient traversal in both directions.

mod node;
mod scheduler;

pub use node::{DirtyState, Node, NodeId, NodeKind};
pub use scheduler::UpdateScheduler;
