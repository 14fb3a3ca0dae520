//! Update Scheduler
//!
//! The scheduler determines which components re-render after an event, and in
//! which order. It ensures that dependencies are always rendered before their
//! dependents, so a parent sees its children's final output.
//!
//! # Algorithm
//!
//! 1. The dispatcher reports what changed: the collections a handler wrote and
//!    the target component if its output changed.
//! 2. Direct dependents of a changed node are marked "dirty".
//! 3. Their transitive dependents are marked "maybe dirty".
//! 4. The marked nodes are sorted topologically (Kahn's algorithm, ties kept in
//!    discovery order).
//! 5. The dispatcher walks the order:
//!    - "dirty" components re-render through the cache
//!    - "maybe dirty" components are skipped unless an upstream render
//!      settled as changed, which upgrades them to "dirty"
//!    - [`UpdateScheduler::settle`] marks each processed node clean

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use super::node::{DirtyState, Node, NodeId, NodeKind};
use crate::component::ComponentId;

/// The update scheduler manages the dependency graph and coordinates updates.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    /// All nodes in the graph, in insertion order.
    nodes: IndexMap<NodeId, Node>,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph, replacing nothing if it already exists.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id().clone();
        self.nodes.entry(id.clone()).or_insert(node);
        id
    }

    pub fn add_component(&mut self, id: &str) -> NodeId {
        self.add_node(Node::component(id))
    }

    /// Remove a node and every edge involving it.
    pub fn remove_node(&mut self, node_id: &NodeId) {
        if let Some(node) = self.nodes.shift_remove(node_id) {
            for dep_id in node.dependencies() {
                if let Some(dep) = self.nodes.get_mut(dep_id) {
                    dep.remove_dependent(node_id);
                }
            }
            for dependent_id in node.dependents() {
                if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                    dependent.remove_dependency(node_id);
                }
            }
        }
    }

    /// Remove a component node and any source left without readers.
    pub fn remove_component(&mut self, id: &str) {
        let node_id = NodeId::component(id);
        let sources: Vec<NodeId> = self
            .nodes
            .get(&node_id)
            .map(|node| {
                node.dependencies()
                    .iter()
                    .filter(|dep| dep.kind() == NodeKind::Source)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        self.remove_node(&node_id);
        for source in sources {
            self.prune_source(&source);
        }
    }

    pub fn get_node(&self, node_id: &NodeId) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn get_node_mut(&mut self, node_id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node_id)
    }

    /// Add a dependency edge: `dependent` depends on `dependency`.
    ///
    /// Source nodes are created on demand. Component nodes must already exist.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if dependency.kind() == NodeKind::Source {
            self.add_node(Node::new(dependency.clone()));
        }
        if !self.nodes.contains_key(&dependency) || !self.nodes.contains_key(&dependent) {
            return;
        }
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent.clone());
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.add_dependency(dependency);
        }
    }

    pub fn remove_edge(&mut self, dependency: &NodeId, dependent: &NodeId) {
        if let Some(dep_node) = self.nodes.get_mut(dependency) {
            dep_node.remove_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(dependent) {
            dependent_node.remove_dependency(dependency);
        }
    }

    /// Replace the `source -> component` edges of a component with `sources`.
    pub fn set_sources(&mut self, component: &str, sources: &[String]) {
        let node_id = NodeId::component(component);
        let Some(node) = self.nodes.get(&node_id) else {
            return;
        };

        let wanted: HashSet<NodeId> = sources.iter().map(NodeId::source).collect();
        let stale: Vec<NodeId> = node
            .dependencies()
            .iter()
            .filter(|dep| dep.kind() == NodeKind::Source && !wanted.contains(*dep))
            .cloned()
            .collect();

        for source in stale {
            self.remove_edge(&source, &node_id);
            self.prune_source(&source);
        }
        for source in sources {
            self.add_edge(NodeId::source(source), node_id.clone());
        }
    }

    fn prune_source(&mut self, source: &NodeId) {
        let orphaned = self
            .nodes
            .get(source)
            .map(|node| node.dependents().is_empty())
            .unwrap_or(false);
        if orphaned {
            self.nodes.shift_remove(source);
        }
    }

    /// Mark `changed` nodes and propagate dirty flags.
    ///
    /// Returns the affected components in topological order. Seeds themselves
    /// are not included unless another seed reaches them.
    pub fn mark_changed(&mut self, changed: &[NodeId]) -> Vec<ComponentId> {
        let mut to_process = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        // Direct dependents are dirty
        for seed in changed {
            if let Some(node) = self.nodes.get(seed) {
                for dependent_id in node.dependents() {
                    queue.push_back((dependent_id.clone(), true));
                }
            }
        }

        // BFS to propagate maybe-dirty status
        while let Some((node_id, direct)) = queue.pop_front() {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                if direct {
                    node.mark_dirty();
                } else {
                    node.mark_maybe_dirty();
                }
                if !visited.insert(node_id.clone()) {
                    continue;
                }
                to_process.push(node_id);

                for dependent_id in node.dependents() {
                    queue.push_back((dependent_id.clone(), false));
                }
            }
        }

        self.topological_sort(to_process)
            .into_iter()
            .filter_map(|id| id.as_component().map(str::to_string))
            .collect()
    }

    /// Perform a topological sort of the given nodes.
    ///
    /// Returns nodes in order such that dependencies come before dependents.
    fn topological_sort(&self, nodes: Vec<NodeId>) -> Vec<NodeId> {
        let node_set: HashSet<&NodeId> = nodes.iter().collect();
        let mut in_degree: HashMap<&NodeId, usize> = HashMap::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::new();

        // Calculate in-degrees (only counting edges within the node set)
        for node_id in &nodes {
            if let Some(node) = self.nodes.get(node_id) {
                let degree = node
                    .dependencies()
                    .iter()
                    .filter(|d| node_set.contains(d))
                    .count();
                in_degree.insert(node_id, degree);
                if degree == 0 {
                    queue.push_back(node_id);
                }
            }
        }

        // Kahn's algorithm
        while let Some(node_id) = queue.pop_front() {
            result.push(node_id.clone());

            if let Some(node) = self.nodes.get(node_id) {
                for dependent_id in node.dependents() {
                    if let Some(degree) = in_degree.get_mut(dependent_id) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(dependent_id);
                        }
                    }
                }
            }
        }

        result
    }

    /// Whether a component must re-render in the current cycle.
    pub fn needs_render(&self, id: &str) -> bool {
        self.dirty_state(id) == Some(DirtyState::Dirty)
    }

    pub fn dirty_state(&self, id: &str) -> Option<DirtyState> {
        self.nodes
            .get(&NodeId::component(id))
            .map(Node::dirty_state)
    }

    /// Mark a processed component clean. If its output changed, its direct
    /// dependents become dirty.
    pub fn settle(&mut self, id: &str, changed: bool) {
        let node_id = NodeId::component(id);
        let dependents: Vec<NodeId> = match self.nodes.get_mut(&node_id) {
            Some(node) => {
                node.mark_clean();
                if changed {
                    node.dependents().iter().cloned().collect()
                } else {
                    Vec::new()
                }
            }
            None => return,
        };

        for dependent_id in dependents {
            if let Some(dependent) = self.nodes.get_mut(&dependent_id) {
                dependent.mark_dirty();
            }
        }
    }

    /// Components that read `source`, in edge order.
    pub fn readers(&self, source: &str) -> Vec<ComponentId> {
        self.nodes
            .get(&NodeId::source(source))
            .map(|node| {
                node.dependents()
                    .iter()
                    .filter_map(|id| id.as_component().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
