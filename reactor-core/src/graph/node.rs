//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.

use std::fmt;

use indexmap::IndexSet;

use crate::component::ComponentId;

/// Identifier of a node in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeId {
    /// An external source, named after a store collection.
    Source(String),

    /// A live component instance.
    Component(ComponentId),
}

impl NodeId {
    pub fn source(name: impl Into<String>) -> Self {
        Self::Source(name.into())
    }

    pub fn component(id: impl Into<ComponentId>) -> Self {
        Self::Component(id.into())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Source(_) => NodeKind::Source,
            Self::Component(_) => NodeKind::Component,
        }
    }

    /// The component id, if this is a component node.
    pub fn as_component(&self) -> Option<&str> {
        match self {
            Self::Component(id) => Some(id),
            Self::Source(_) => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(name) => write!(f, "source:{name}"),
            Self::Component(id) => write!(f, "component:{id}"),
        }
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// External data. These are roots: only dependents, no dependencies.
    Source,

    /// A component. Depends on the sources it reads and on its children.
    Component,
}

/// Dirty state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// The last render is up-to-date.
    Clean,

    /// Something upstream might have changed; the node re-renders only if a
    /// direct input is confirmed changed.
    MaybeDirty,

    /// A direct input changed. The node must re-render.
    Dirty,
}

/// A node in the dependency graph.
#[derive(Debug)]
pub struct Node {
    id: NodeId,

    dirty: DirtyState,

    /// Nodes that this node depends on.
    dependencies: IndexSet<NodeId>,

    /// Nodes that depend on this node, in the order the edges were added.
    dependents: IndexSet<NodeId>,
}

impl Node {
    /// Create a clean node. Components are rendered once before they are
    /// added, so nothing starts dirty.
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            dirty: DirtyState::Clean,
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
        }
    }

    pub fn source(name: impl Into<String>) -> Self {
        Self::new(NodeId::source(name))
    }

    pub fn component(id: impl Into<ComponentId>) -> Self {
        Self::new(NodeId::component(id))
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.id.kind()
    }

    pub fn dirty_state(&self) -> DirtyState {
        self.dirty
    }

    pub fn is_clean(&self) -> bool {
        self.dirty == DirtyState::Clean
    }

    pub fn mark_clean(&mut self) {
        self.dirty = DirtyState::Clean;
    }

    /// Mark the node as maybe dirty. Never downgrades a dirty node.
    pub fn mark_maybe_dirty(&mut self) {
        if self.dirty == DirtyState::Clean {
            self.dirty = DirtyState::MaybeDirty;
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = DirtyState::Dirty;
    }

    pub fn add_dependency(&mut self, node_id: NodeId) {
        self.dependencies.insert(node_id);
    }

    pub fn remove_dependency(&mut self, node_id: &NodeId) {
        self.dependencies.shift_remove(node_id);
    }

    pub fn dependencies(&self) -> &IndexSet<NodeId> {
        &self.dependencies
    }

    pub fn add_dependent(&mut self, node_id: NodeId) {
        self.dependents.insert(node_id);
    }

    pub fn remove_dependent(&mut self, node_id: &NodeId) {
        self.dependents.shift_remove(node_id);
    }

    pub fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }
}
