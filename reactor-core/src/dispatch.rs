//! Event Dispatcher
//!
//! Routes a client event to the handler of its target component and works out
//! which components must be re-rendered as a result.
//!
//! # Dispatch Cycle
//!
//! 1. Resolve the target (`UnknownComponent`) and its handler (`UnknownEvent`).
//! 2. Run the handler against a write-tracking view of the store.
//! 3. Render the target with its new state. Only once this succeeds is the
//!    state assigned and the snapshot committed; a failing handler or render
//!    leaves the component exactly as it was and is kept in [`Dispatch::error`].
//! 4. Seed the dependency graph with the collections the handler wrote, even
//!    if it failed afterwards, and, if its output changed, the target itself.
//! 5. Re-render every dirty component in topological order through the same
//!    cache and diff path. A component whose output changed makes its own
//!    dependents dirty.
//!
//! Failures while re-rendering a dependent do not undo the target's
//! transition. They are collected in [`Dispatch::failures`] and the remaining
//! components still render.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::component::{ComponentId, EventContext, Payload};
use crate::error::{ReactorError, Result};
use crate::graph::NodeId;
use crate::render::Patch;
use crate::runtime::Runtime;
use crate::store::{Store, TrackedStore};

/// A client-originated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub target_id: ComponentId,
    pub name: String,
    #[serde(default)]
    pub payload: Payload,
}

impl Event {
    pub fn new(target_id: impl Into<ComponentId>, name: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            name: name.into(),
            payload: Payload::new(),
        }
    }

    /// Add one payload field.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(field.into(), value.into());
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }
}

/// A patch for one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentPatch {
    pub component_id: ComponentId,
    pub patch: Patch,
}

/// Everything one event produced.
#[derive(Debug, Default)]
pub struct Dispatch {
    /// Patches in push order: the target first, then dependents.
    pub patches: Vec<ComponentPatch>,

    /// Dependents that failed to re-render.
    pub failures: Vec<(ComponentId, ReactorError)>,

    /// The target's own failure. Writes made before it still cascaded.
    pub error: Option<ReactorError>,
}

impl Dispatch {
    /// Ids for which a patch was produced.
    pub fn affected(&self) -> Vec<ComponentId> {
        self.patches.iter().map(|p| p.component_id.clone()).collect()
    }

    pub fn patch_for(&self, id: &str) -> Option<&Patch> {
        self.patches
            .iter()
            .find(|p| p.component_id == id)
            .map(|p| &p.patch)
    }
}

impl Runtime {
    /// Run one event through its handler and re-render what it affected.
    pub async fn dispatch(&mut self, event: Event) -> Result<Dispatch> {
        let Event {
            target_id,
            name,
            payload,
        } = event;

        let instance = self.registry.get(&target_id)?;
        let ty = self.component_type(instance.type_name())?;
        let handler = ty
            .handler(&name)
            .cloned()
            .ok_or_else(|| ReactorError::UnknownEvent {
                type_name: ty.name().to_string(),
                event: name.clone(),
            })?;

        let tracked = Arc::new(TrackedStore::new(Arc::clone(self.store())));
        let cx = EventContext {
            state: instance.state().clone(),
            payload,
            store: Arc::clone(&tracked) as Arc<dyn Store>,
        };

        let transition = match handler(cx).await {
            Ok(mut state) => {
                state.insert("id".into(), Value::String(target_id.clone()));
                match self.render_pass(&ty, &target_id, &state).await {
                    Ok(pending) => Ok((state, pending)),
                    Err(err) => Err(err),
                }
            }
            Err(err) => Err(ReactorError::from(err)),
        };

        let written = tracked.written();
        let mut dispatch = Dispatch::default();
        let mut seeds: Vec<NodeId> = written.iter().cloned().map(NodeId::Source).collect();
        let skip = match transition {
            Ok((state, pending)) => {
                self.registry.set_state(&target_id, state)?;
                let target_patch = pending.outcome.patch();
                self.commit(&target_id, pending);

                debug!(
                    component = %target_id,
                    event = %name,
                    changed = target_patch.is_some(),
                    written = ?written,
                    "handled event"
                );
                if let Some(patch) = target_patch {
                    seeds.push(NodeId::component(&target_id));
                    dispatch.patches.push(ComponentPatch {
                        component_id: target_id.clone(),
                        patch,
                    });
                }
                Some(target_id.as_str())
            }
            Err(err) => {
                warn!(component = %target_id, event = %name, written = ?written, error = %err, "event failed");
                dispatch.error = Some(err);
                None
            }
        };

        self.cascade(&seeds, skip, &mut dispatch).await;
        Ok(dispatch)
    }

    /// Re-render `id` with its current state, then everything downstream of it.
    ///
    /// Used when the composition around a component changed rather than its
    /// state or reads.
    pub(crate) async fn refresh(&mut self, id: &str) -> Dispatch {
        let mut dispatch = Dispatch::default();
        match self.rerender(id).await {
            Ok(Some(patch)) => {
                dispatch.patches.push(ComponentPatch {
                    component_id: id.to_string(),
                    patch,
                });
                self.cascade(&[NodeId::component(id)], Some(id), &mut dispatch).await;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(component = %id, error = %err, "refresh failed");
                dispatch.failures.push((id.to_string(), err));
            }
        }
        dispatch
    }

    /// Re-render every component dirtied by `seeds`, in topological order.
    async fn cascade(&mut self, seeds: &[NodeId], skip: Option<&str>, dispatch: &mut Dispatch) {
        for id in self.graph.mark_changed(seeds) {
            if Some(id.as_str()) == skip || !self.graph.needs_render(&id) {
                self.graph.settle(&id, false);
                continue;
            }

            match self.rerender(&id).await {
                Ok(Some(patch)) => {
                    self.graph.settle(&id, true);
                    dispatch.patches.push(ComponentPatch {
                        component_id: id,
                        patch,
                    });
                }
                Ok(None) => self.graph.settle(&id, false),
                Err(err) => {
                    warn!(component = %id, error = %err, "dependent failed to re-render");
                    self.graph.settle(&id, false);
                    dispatch.failures.push((id, err));
                }
            }
        }
    }

    /// Re-render a live component with its current state.
    async fn rerender(&mut self, id: &str) -> Result<Option<Patch>> {
        let instance = self.registry.get(id)?;
        let ty = self.component_type(instance.type_name())?;
        let state = instance.state().clone();

        let pending = self.render_pass(&ty, id, &state).await?;
        let patch = pending.outcome.patch();
        self.commit(id, pending);
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentLibrary, ComponentType, FieldsExt, HandlerError, Props, ReadSpec};
    use crate::error::ErrorKind;
    use crate::store::{Fields, MemoryStore};
    use serde_json::json;

    /// A writer that appends to `notes`, a reader listing them, a toggle with
    /// no reads and a frame embedding its children.
    fn library() -> Arc<ComponentLibrary> {
        let writer = ComponentType::new("x-writer", |_| "<button>write</button>".to_string())
            .on("write", |cx: EventContext| async move {
                let text = cx.payload.require_str("text")?.to_string();
                let mut fields = Fields::new();
                fields.insert("text".into(), json!(text));
                cx.store.create("notes", fields).await?;
                Ok(cx.state)
            })
            .on("fail", |_cx: EventContext| async move { Err(HandlerError::new("nope")) })
            .on("write_then_fail", |cx: EventContext| async move {
                let mut fields = Fields::new();
                fields.insert("text".into(), json!("partial"));
                cx.store.create("notes", fields).await?;
                Err(HandlerError::new("failed after writing"))
            })
            .on("noop", |cx: EventContext| async move { Ok(cx.state) });

        let reader = ComponentType::new("x-reader", |cx| {
            let items: String = cx
                .collection("notes")
                .iter()
                .map(|r| format!("<li>{}</li>", r.str_field("text")))
                .collect();
            format!("<ul>{items}</ul>")
        })
        .reads(|_| vec![ReadSpec::collection("notes")]);

        let toggle = ComponentType::new("x-toggle", |cx| {
            let on = cx.state().bool_field("on").unwrap_or(false);
            format!("<span>{}</span>", if on { "on" } else { "off" })
        })
        .on("flip", |cx: EventContext| async move {
            let mut state = cx.state;
            let on = state.bool_field("on").unwrap_or(false);
            state.insert("on".into(), json!(!on));
            Ok(state)
        })
        .on("set", |cx: EventContext| async move {
            let mut state = cx.state;
            let on = cx.payload.require_bool("on")?;
            state.insert("on".into(), json!(on));
            Ok(state)
        });

        let frame = ComponentType::new("x-frame", |cx| {
            let inner: String = cx.children().iter().map(|child| child.markup.to_string()).collect();
            format!("<div>{inner}</div>")
        });

        Arc::new(ComponentLibrary::new().with(writer).with(reader).with(toggle).with(frame))
    }

    fn runtime() -> Runtime {
        Runtime::new(library(), Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn state_change_patches_the_target() {
        let mut rt = runtime();
        let (toggle, _) = rt.join("x-toggle", Props::new(), None).await.unwrap();

        let dispatch = rt.dispatch(Event::new(&toggle, "flip")).await.unwrap();
        assert_eq!(dispatch.affected(), vec![toggle.clone()]);
        assert_eq!(rt.state(&toggle).unwrap().bool_field("on"), Some(true));
    }

    #[tokio::test]
    async fn unchanged_state_is_a_cache_hit() {
        let mut rt = runtime();
        let (toggle, _) = rt.join("x-toggle", Props::new(), None).await.unwrap();

        let dispatch = rt.dispatch(Event::new(&toggle, "set").with("on", false)).await.unwrap();
        assert!(dispatch.affected().is_empty());
        assert_eq!(rt.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn writes_cascade_to_readers() {
        let mut rt = runtime();
        let (writer, _) = rt.join("x-writer", Props::new(), None).await.unwrap();
        let (reader, _) = rt.join("x-reader", Props::new(), None).await.unwrap();
        let (toggle, _) = rt.join("x-toggle", Props::new(), None).await.unwrap();

        let dispatch = rt
            .dispatch(Event::new(&writer, "write").with("text", "hello"))
            .await
            .unwrap();

        // The writer's own markup is unchanged; only the reader is patched.
        assert_eq!(dispatch.affected(), vec![reader.clone()]);
        let markup = rt.snapshot(&reader).unwrap().tree().to_markup();
        assert!(markup.contains("<li>hello</li>"));
        assert!(dispatch.patch_for(&toggle).is_none());
    }

    #[tokio::test]
    async fn parents_embedding_a_changed_child_are_patched() {
        let mut rt = runtime();
        let (frame, _) = rt.join("x-frame", Props::new(), None).await.unwrap();
        let (toggle, _) = rt.join("x-toggle", Props::new(), Some(&frame)).await.unwrap();

        let joined = rt.refresh(&frame).await;
        assert_eq!(joined.affected(), vec![frame.clone()]);
        assert!(rt.snapshot(&frame).unwrap().markup().contains("<span>off</span>"));

        let dispatch = rt.dispatch(Event::new(&toggle, "flip")).await.unwrap();
        assert_eq!(dispatch.affected(), vec![toggle.clone(), frame.clone()]);
        let frame_tree = rt.snapshot(&frame).unwrap().tree();
        assert_eq!(frame_tree.select("x-toggle span")[0].text_content(), "on");

        // An unchanged child leaves the parent a cache hit.
        let hits = rt.cache().stats().hits;
        let dispatch = rt.dispatch(Event::new(&toggle, "set").with("on", true)).await.unwrap();
        assert!(dispatch.affected().is_empty());
        assert_eq!(rt.cache().stats().hits, hits + 1);
    }

    #[tokio::test]
    async fn refresh_after_remove_drops_the_child() {
        let mut rt = runtime();
        let (frame, _) = rt.join("x-frame", Props::new(), None).await.unwrap();
        let (toggle, _) = rt.join("x-toggle", Props::new(), Some(&frame)).await.unwrap();
        rt.refresh(&frame).await;

        rt.remove(&toggle).unwrap();
        let dispatch = rt.refresh(&frame).await;
        assert_eq!(dispatch.affected(), vec![frame.clone()]);
        assert!(rt.snapshot(&frame).unwrap().tree().select("x-toggle").is_empty());
    }

    #[tokio::test]
    async fn unknown_target_and_event_are_typed_errors() {
        let mut rt = runtime();
        let err = rt.dispatch(Event::new("ghost", "flip")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownComponent);

        let (toggle, _) = rt.join("x-toggle", Props::new(), None).await.unwrap();
        let err = rt.dispatch(Event::new(&toggle, "explode")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownEvent);
    }

    #[tokio::test]
    async fn handler_errors_leave_state_untouched() {
        let mut rt = runtime();
        let (writer, _) = rt.join("x-writer", Props::new(), None).await.unwrap();
        let before = rt.state(&writer).unwrap().clone();

        let dispatch = rt.dispatch(Event::new(&writer, "fail")).await.unwrap();
        let err = dispatch.error.unwrap();
        assert_eq!(err.kind(), ErrorKind::HandlerError);
        assert_eq!(err.to_string(), "nope");
        assert!(dispatch.patches.is_empty());

        let dispatch = rt.dispatch(Event::new(&writer, "write")).await.unwrap();
        assert_eq!(dispatch.error.unwrap().kind(), ErrorKind::HandlerError);

        assert_eq!(rt.state(&writer).unwrap(), &before);
    }

    #[tokio::test]
    async fn writes_before_a_handler_error_still_cascade() {
        let mut rt = runtime();
        let (writer, _) = rt.join("x-writer", Props::new(), None).await.unwrap();
        let (reader, _) = rt.join("x-reader", Props::new(), None).await.unwrap();
        let before = rt.state(&writer).unwrap().clone();

        let dispatch = rt.dispatch(Event::new(&writer, "write_then_fail")).await.unwrap();
        assert_eq!(dispatch.error.as_ref().unwrap().to_string(), "failed after writing");
        assert_eq!(dispatch.affected(), vec![reader.clone()]);
        let markup = rt.snapshot(&reader).unwrap().tree().to_markup();
        assert!(markup.contains("<li>partial</li>"));
        assert_eq!(rt.state(&writer).unwrap(), &before);
    }

    #[tokio::test]
    async fn handlers_cannot_change_the_id() {
        let mut rt = runtime();
        let (toggle, _) = rt.join("x-toggle", Props::new(), None).await.unwrap();
        rt.dispatch(Event::new(&toggle, "flip")).await.unwrap();
        assert_eq!(rt.state(&toggle).unwrap().str_field("id"), Some(toggle.as_str()));
    }

    #[test]
    fn events_use_camel_case_fields() {
        let event = Event::new("a", "add").with("new_item", "x");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, json!({"targetId": "a", "name": "add", "payload": {"new_item": "x"}}));
    }
}
