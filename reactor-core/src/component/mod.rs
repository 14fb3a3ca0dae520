//! Components
//!
//! A component type is a name, a pure render function, a table of event
//! handlers, an optional mount hook and an optional reads declaration. Types
//! are collected in a [`ComponentLibrary`], which is immutable once built and
//! shared read-only by every session.
//!
//! Handlers are state transitions: they receive the current state, the event
//! payload and the store, and return the next state. They never see other
//! components. Anything a handler wants others to observe goes through the
//! store, and components that declared a read on the written collection
//! re-render in the same dispatch cycle.
//!
//! # Example
//!
//! ```rust,ignore
//! let counter = ComponentType::new("x-counter", |cx| {
//!     format!("<span>{}</span>", cx.state().get("n").unwrap_or(&json!(0)))
//! })
//! .on("increment", |cx: EventContext| async move {
//!     let mut state = cx.state;
//!     let n = state.get("n").and_then(Value::as_i64).unwrap_or(0);
//!     state.insert("n".into(), json!(n + 1));
//!     Ok(state)
//! });
//! ```

mod reads;
mod registry;
mod state;

pub use reads::{DeriveFn, ReadSet, ReadSpec, ReadValue};
pub use registry::{ComponentId, Instance, Registry};
pub use state::{FieldsExt, HandlerError, Payload, Props, State};

pub(crate) use state::id_string;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde_json::Value;

use crate::render::{Fingerprint, Fragment};
use crate::store::{Record, RecordId, Store};

/// Input of an event handler.
pub struct EventContext {
    pub state: State,
    pub payload: Payload,
    pub store: Arc<dyn Store>,
}

/// Input of a mount hook. `props` already carries the assigned `id`.
pub struct MountContext {
    pub props: Props,
    pub store: Arc<dyn Store>,
}

/// The last committed render of a live child, as its parent sees it.
///
/// A parent's fingerprint covers the fingerprints of its children, so a
/// parent embedding child markup re-renders whenever a child does.
#[derive(Debug, Clone)]
pub struct ChildView {
    pub id: ComponentId,
    pub type_name: String,
    pub fingerprint: Fingerprint,
    pub markup: Arc<str>,
    pub tree: Arc<Fragment>,
}

/// Input of a render function.
pub struct RenderContext<'a> {
    type_name: &'a str,
    id: &'a str,
    state: &'a State,
    reads: &'a ReadSet,
    children: &'a [ChildView],
}

impl<'a> RenderContext<'a> {
    pub fn new(type_name: &'a str, id: &'a str, state: &'a State, reads: &'a ReadSet) -> Self {
        Self {
            type_name,
            id,
            state,
            reads,
            children: &[],
        }
    }

    pub fn with_children(mut self, children: &'a [ChildView]) -> Self {
        self.children = children;
        self
    }

    pub fn type_name(&self) -> &str {
        self.type_name
    }

    pub fn id(&self) -> &str {
        self.id
    }

    pub fn state(&self) -> &State {
        self.state
    }

    pub fn reads(&self) -> &ReadSet {
        self.reads
    }

    pub fn collection(&self, name: &str) -> &[Record] {
        self.reads.collection(name)
    }

    pub fn record(&self, collection: &str, id: RecordId) -> Option<&Record> {
        self.reads.record(collection, id)
    }

    pub fn derived(&self, name: &str) -> Option<&Value> {
        self.reads.derived(name)
    }

    /// Live children in join order.
    pub fn children(&self) -> &[ChildView] {
        self.children
    }

    pub fn child(&self, id: &str) -> Option<&ChildView> {
        self.children.iter().find(|child| child.id == id)
    }
}

pub type Handler = Arc<dyn Fn(EventContext) -> BoxFuture<'static, Result<State, HandlerError>> + Send + Sync>;
pub type MountFn = Arc<dyn Fn(MountContext) -> BoxFuture<'static, Result<State, HandlerError>> + Send + Sync>;
pub type ReadsFn = Arc<dyn Fn(&State) -> Vec<ReadSpec> + Send + Sync>;
pub type RenderFn = Arc<dyn Fn(&RenderContext<'_>) -> String + Send + Sync>;

/// A component type: render function plus handler table.
#[derive(Clone)]
pub struct ComponentType {
    name: String,
    render: RenderFn,
    handlers: IndexMap<String, Handler>,
    mount: Option<MountFn>,
    reads: Option<ReadsFn>,
}

impl ComponentType {
    /// Create a type named `name`, which is also the tag of its root element.
    pub fn new<F>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&RenderContext<'_>) -> String + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            render: Arc::new(render),
            handlers: IndexMap::new(),
            mount: None,
            reads: None,
        }
    }

    /// Register the handler for `event`, replacing any previous one.
    pub fn on<F, Fut>(mut self, event: impl Into<String>, f: F) -> Self
    where
        F: Fn(EventContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<State, HandlerError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |cx: EventContext| f(cx).boxed());
        self.handlers.insert(event.into(), handler);
        self
    }

    /// Set the mount hook producing the initial state from the props.
    pub fn mount<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(MountContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<State, HandlerError>> + Send + 'static,
    {
        let mount: MountFn = Arc::new(move |cx: MountContext| f(cx).boxed());
        self.mount = Some(mount);
        self
    }

    /// Declare the external reads of a render, given the state.
    pub fn reads<F>(mut self, reads: F) -> Self
    where
        F: Fn(&State) -> Vec<ReadSpec> + Send + Sync + 'static,
    {
        let reads: ReadsFn = Arc::new(reads);
        self.reads = Some(reads);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self, event: &str) -> Option<&Handler> {
        self.handlers.get(event)
    }

    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn declared_reads(&self, state: &State) -> Vec<ReadSpec> {
        self.reads.as_ref().map(|reads| reads(state)).unwrap_or_default()
    }

    /// Run the mount hook. Without one, the props become the state.
    pub async fn run_mount(&self, cx: MountContext) -> Result<State, HandlerError> {
        match &self.mount {
            Some(mount) => mount(cx).await,
            None => Ok(cx.props),
        }
    }

    /// Render the inner markup of a component.
    pub fn render(&self, cx: &RenderContext<'_>) -> String {
        (self.render)(cx)
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("name", &self.name)
            .field("events", &self.handlers.keys().collect::<Vec<_>>())
            .field("has_mount", &self.mount.is_some())
            .field("has_reads", &self.reads.is_some())
            .finish()
    }
}

/// The set of component types a server knows about.
#[derive(Debug, Clone, Default)]
pub struct ComponentLibrary {
    types: IndexMap<String, Arc<ComponentType>>,
}

impl ComponentLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type, replacing any type with the same name.
    pub fn register(&mut self, component: ComponentType) {
        self.types
            .insert(component.name.clone(), Arc::new(component));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, component: ComponentType) -> Self {
        self.register(component);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<ComponentType>> {
        self.types.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::{json, Value};

    fn counter() -> ComponentType {
        ComponentType::new("x-counter", |cx| {
            let n = cx.state().get("n").and_then(Value::as_i64).unwrap_or(0);
            format!("<span>{n}</span>")
        })
        .on("increment", |cx: EventContext| async move {
            let mut state = cx.state;
            let n = state.get("n").and_then(Value::as_i64).unwrap_or(0);
            state.insert("n".into(), json!(n + 1));
            Ok(state)
        })
    }

    #[tokio::test]
    async fn handlers_transform_state() {
        let ty = counter();
        let handler = ty.handler("increment").unwrap();

        let cx = EventContext {
            state: json!({"id": "c", "n": 1}).as_object().cloned().unwrap(),
            payload: Payload::new(),
            store: Arc::new(MemoryStore::new()),
        };
        let state = handler(cx).await.unwrap();
        assert_eq!(state.get("n"), Some(&json!(2)));
        assert!(ty.handler("decrement").is_none());
    }

    #[tokio::test]
    async fn default_mount_uses_props() {
        let ty = counter();
        let props = json!({"id": "c", "n": 5}).as_object().cloned().unwrap();
        let state = ty
            .run_mount(MountContext {
                props: props.clone(),
                store: Arc::new(MemoryStore::new()),
            })
            .await
            .unwrap();
        assert_eq!(state, props);
    }

    #[test]
    fn render_sees_state_and_reads() {
        let ty = counter();
        let state = json!({"n": 3}).as_object().cloned().unwrap();
        let reads = ReadSet::default();
        let cx = RenderContext::new("x-counter", "c", &state, &reads);
        assert_eq!(ty.render(&cx), "<span>3</span>");
        assert!(ty.declared_reads(&state).is_empty());
    }

    #[test]
    fn library_lookup() {
        let library = ComponentLibrary::new().with(counter());
        assert_eq!(library.len(), 1);
        assert_eq!(library.get("x-counter").unwrap().name(), "x-counter");
        assert!(library.get("x-nope").is_none());
        assert_eq!(library.names().collect::<Vec<_>>(), vec!["x-counter"]);
    }
}
