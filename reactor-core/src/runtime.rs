//! Session Runtime
//!
//! The runtime owns the per-session state of the engine: the registry of live
//! components, their render cache and the dependency graph between them and
//! the store. It implements join and remove here, and event dispatch in
//! [`crate::dispatch`].
//!
//! Every render goes through [`Runtime::render_pass`]: load declared reads,
//! collect the committed output of live children, fingerprint, consult the
//! cache, wrap the inner markup in the root element. The pass only computes;
//! [`Runtime::commit`] makes the result visible, so a failure anywhere before
//! the commit leaves the session as it was.
//!
//! A parent sees its children through their snapshots. Joining or removing a
//! child therefore re-renders the parent, see [`Runtime::refresh`].

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::component::{
    id_string, ChildView, ComponentId, ComponentLibrary, ComponentType, Instance, MountContext, Props, ReadSet,
    Registry, RenderContext, State,
};
use crate::error::{ReactorError, Result};
use crate::graph::{NodeId, UpdateScheduler};
use crate::render::{fingerprint, wrap_root, RenderCache, RenderOutcome, Snapshot};
use crate::store::Store;

/// A computed but uncommitted render.
pub(crate) struct Pending {
    pub(crate) outcome: RenderOutcome,
    sources: Vec<String>,
}

/// Per-session engine state.
pub struct Runtime {
    library: Arc<ComponentLibrary>,
    store: Arc<dyn Store>,
    pub(crate) registry: Registry,
    pub(crate) cache: RenderCache,
    pub(crate) graph: UpdateScheduler,
}

impl Runtime {
    pub fn new(library: Arc<ComponentLibrary>, store: Arc<dyn Store>) -> Self {
        Self {
            library,
            store,
            registry: Registry::new(),
            cache: RenderCache::new(),
            graph: UpdateScheduler::new(),
        }
    }

    pub fn library(&self) -> &Arc<ComponentLibrary> {
        &self.library
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    pub fn graph(&self) -> &UpdateScheduler {
        &self.graph
    }

    /// Current state of a live component.
    pub fn state(&self, id: &str) -> Result<&State> {
        Ok(self.registry.get(id)?.state())
    }

    /// Snapshot last sent for a live component.
    pub fn snapshot(&self, id: &str) -> Option<&Snapshot> {
        self.cache.get(id)
    }

    pub(crate) fn component_type(&self, type_name: &str) -> Result<Arc<ComponentType>> {
        self.library.get(type_name).ok_or_else(|| ReactorError::UnknownType {
            type_name: type_name.to_string(),
        })
    }

    /// Create a component and render it for the first time.
    ///
    /// `props.id`, if present, is the preferred id. The mount hook (or the
    /// props themselves) provide the initial state, which always carries the
    /// assigned id.
    pub async fn join(
        &mut self,
        type_name: &str,
        mut props: Props,
        parent: Option<&str>,
    ) -> Result<(ComponentId, Arc<str>)> {
        let ty = self.component_type(type_name)?;
        if let Some(parent) = parent {
            self.registry.get(parent)?;
        }

        let preferred = props.get("id").and_then(id_string);
        let id = self.registry.allocate(type_name, preferred.as_deref())?;
        props.insert("id".into(), Value::String(id.clone()));

        let mut state = ty
            .run_mount(MountContext {
                props,
                store: Arc::clone(&self.store),
            })
            .await?;
        state.insert("id".into(), Value::String(id.clone()));

        let pending = self.render_pass(&ty, &id, &state).await?;
        let markup = Arc::clone(pending.outcome.snapshot().markup());

        self.registry
            .insert(Instance::new(id.clone(), type_name, state, parent.map(str::to_string)))?;
        self.graph.add_component(&id);
        if let Some(parent) = parent {
            self.graph
                .add_edge(NodeId::component(&id), NodeId::component(parent));
        }
        self.commit(&id, pending);

        debug!(component = %id, component_type = type_name, parent = ?parent, "joined");
        Ok((id, markup))
    }

    /// Remove a component and its children. Returns the removed ids.
    ///
    /// A surviving parent still embeds the old child until it is refreshed.
    pub fn remove(&mut self, id: &str) -> Result<Vec<ComponentId>> {
        let removed = self.registry.remove(id)?;
        for id in &removed {
            self.cache.evict(id);
            self.graph.remove_component(id);
        }
        debug!(component = %id, count = removed.len(), "removed");
        Ok(removed)
    }

    /// Drop every component, cache entry and graph node.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.cache.clear();
        self.graph.clear();
    }

    /// Committed output of the live children of `id`, in join order.
    fn child_views(&self, id: &str) -> Vec<ChildView> {
        let Ok(instance) = self.registry.get(id) else {
            return Vec::new();
        };
        instance
            .children()
            .iter()
            .filter_map(|child| {
                let snapshot = self.cache.get(child)?;
                let type_name = self.registry.get(child).ok()?.type_name().to_string();
                Some(ChildView {
                    id: child.clone(),
                    type_name,
                    fingerprint: snapshot.fingerprint(),
                    markup: Arc::clone(snapshot.markup()),
                    tree: snapshot.shared_tree(),
                })
            })
            .collect()
    }

    /// Load reads, fingerprint and render through the cache, without committing.
    pub(crate) async fn render_pass(&mut self, ty: &ComponentType, id: &str, state: &State) -> Result<Pending> {
        let specs = ty.declared_reads(state);
        let reads = ReadSet::load(self.store.as_ref(), &specs).await?;
        let children = self.child_views(id);
        let child_keys: Vec<(&str, u64)> = children
            .iter()
            .map(|child| (child.id.as_str(), child.fingerprint))
            .collect();
        let key = fingerprint(ty.name(), state, &(&reads, &child_keys))?;

        let outcome = self.cache.peek(id, key, || {
            let cx = RenderContext::new(ty.name(), id, state, &reads).with_children(&children);
            wrap_root(ty.name(), id, state, &ty.render(&cx))
        })?;

        Ok(Pending {
            outcome,
            sources: reads.sources(),
        })
    }

    /// Make a render pass visible: store the snapshot and refresh read edges.
    pub(crate) fn commit(&mut self, id: &str, pending: Pending) {
        self.cache.commit(id, &pending.outcome);
        self.graph.set_sources(id, &pending.sources);
    }
}
