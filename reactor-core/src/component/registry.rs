//! Component Registry
//!
//! Tracks the live component instances of one session. Ids are stable for the
//! life of an instance; generated ids come from a per-session counter and are
//! never handed out twice.

use indexmap::IndexMap;

use super::state::State;
use crate::error::{ReactorError, Result};

/// Identifier of a component instance, unique within a session.
pub type ComponentId = String;

/// A live component instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    id: ComponentId,
    type_name: String,
    state: State,
    parent: Option<ComponentId>,
    children: Vec<ComponentId>,
}

impl Instance {
    pub fn new(
        id: impl Into<ComponentId>,
        type_name: impl Into<String>,
        state: State,
        parent: Option<ComponentId>,
    ) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            state,
            parent,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn children(&self) -> &[ComponentId] {
        &self.children
    }
}

/// Live instances of one session, in join order.
#[derive(Debug, Default)]
pub struct Registry {
    instances: IndexMap<ComponentId, Instance>,
    generated: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the id for a new instance of `type_name`.
    ///
    /// A preferred id is used as given and must not collide with a live one.
    /// Otherwise an id of the form `<type>-<n>` is generated.
    pub fn allocate(&mut self, type_name: &str, preferred: Option<&str>) -> Result<ComponentId> {
        if let Some(id) = preferred {
            if self.instances.contains_key(id) {
                return Err(ReactorError::DuplicateId { id: id.to_string() });
            }
            return Ok(id.to_string());
        }

        loop {
            self.generated += 1;
            let id = format!("{type_name}-{}", self.generated);
            if !self.instances.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    /// Store an instance and link it to its parent.
    pub fn insert(&mut self, instance: Instance) -> Result<()> {
        if self.instances.contains_key(&instance.id) {
            return Err(ReactorError::DuplicateId { id: instance.id });
        }
        if let Some(parent) = &instance.parent {
            self.get_mut(parent)?.children.push(instance.id.clone());
        }
        self.instances.insert(instance.id.clone(), instance);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&Instance> {
        self.instances
            .get(id)
            .ok_or_else(|| ReactorError::unknown_component(id))
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Instance> {
        self.instances
            .get_mut(id)
            .ok_or_else(|| ReactorError::unknown_component(id))
    }

    pub fn set_state(&mut self, id: &str, state: State) -> Result<()> {
        self.get_mut(id)?.state = state;
        Ok(())
    }

    /// Remove an instance and, recursively, its children.
    ///
    /// Returns every removed id, the requested one first.
    pub fn remove(&mut self, id: &str) -> Result<Vec<ComponentId>> {
        let parent = self.get(id)?.parent.clone();
        if let Some(parent) = parent {
            if let Some(instance) = self.instances.get_mut(&parent) {
                instance.children.retain(|child| child != id);
            }
        }

        let mut removed = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(next) = stack.pop() {
            if let Some(instance) = self.instances.shift_remove(&next) {
                stack.extend(instance.children.into_iter().rev());
                removed.push(next);
            }
        }
        Ok(removed)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.instances.contains_key(id)
    }

    /// Live ids in join order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn clear(&mut self) {
        self.instances.clear();
    }
}
