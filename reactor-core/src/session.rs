//! Session Lifecycle
//!
//! A session owns one connection's runtime (registry, render cache and
//! dependency graph) and its ordered outbound queue. It is driven by a single
//! task, one client message at a time, so every patch of an event is queued
//! before the next event is dispatched.
//!
//! # States
//!
//! ```text
//! Connecting ──join──► Joined ──event/join/remove──► Joined
//!      │                  │
//!      └──close/leave─────┴──► Closed
//! ```
//!
//! Client mistakes (unknown ids, unknown events, handler failures) are pushed
//! back as `error` messages and never close the session.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::component::{ComponentId, ComponentLibrary, Props};
use crate::dispatch::{Dispatch, Event};
use crate::error::{ReactorError, Result};
use crate::runtime::Runtime;
use crate::store::Store;
use crate::transport::protocol::{ClientMessage, ServerMessage};

/// Process-unique session identifier.
pub type SessionId = u64;

fn next_session_id() -> SessionId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Joined,
    Closed,
}

/// Ordered outbound queue of a session.
///
/// Pushing never fails: once the receiving side is gone, messages are dropped.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl Outbox {
    pub fn new(tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn push(&self, msg: ServerMessage) {
        if self.tx.send(msg).is_err() {
            debug!("outbound queue closed, dropping message");
        }
    }
}

/// One client session.
pub struct Session {
    id: SessionId,
    phase: Phase,
    runtime: Runtime,
    outbox: Outbox,
}

impl Session {
    pub fn new(library: Arc<ComponentLibrary>, store: Arc<dyn Store>, outbox: Outbox) -> Self {
        Self {
            id: next_session_id(),
            phase: Phase::Connecting,
            runtime: Runtime::new(library, store),
            outbox,
        }
    }

    /// A session whose outbound messages arrive on the returned receiver.
    pub fn channel(
        library: Arc<ComponentLibrary>,
        store: Arc<dyn Store>,
    ) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (outbox, rx) = Outbox::channel();
        (Self::new(library, store, outbox), rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    fn ensure_open(&self) -> Result<()> {
        match self.phase {
            Phase::Closed => Err(ReactorError::Closed),
            _ => Ok(()),
        }
    }

    /// Join a component and push its initial markup.
    ///
    /// With a parent, the parent re-renders around the new child and its
    /// patch follows the `joined` message.
    pub async fn join(
        &mut self,
        type_name: &str,
        props: Props,
        parent: Option<&str>,
    ) -> Result<(ComponentId, Arc<str>)> {
        self.ensure_open()?;
        let (id, markup) = self.runtime.join(type_name, props, parent).await?;

        self.outbox.push(ServerMessage::Joined {
            id: id.clone(),
            markup: markup.to_string(),
        });
        self.phase = Phase::Joined;
        if let Some(parent) = parent {
            let dispatch = self.runtime.refresh(parent).await;
            self.push_dispatch(dispatch);
        }
        Ok((id, markup))
    }

    /// Dispatch an event and push its patches in order.
    ///
    /// Returns the ids for which a patch was queued. Dependents that failed to
    /// re-render are reported as `error` messages after the patches. If the
    /// target itself failed, its error is returned once the patches of any
    /// writes it made are queued.
    pub async fn send(&mut self, event: Event) -> Result<Vec<ComponentId>> {
        self.ensure_open()?;
        let mut dispatch = self.runtime.dispatch(event).await?;

        let error = dispatch.error.take();
        let affected = self.push_dispatch(dispatch);
        match error {
            Some(err) => Err(err),
            None => Ok(affected),
        }
    }

    /// Remove a component subtree and push the removed ids, then the patch of
    /// the parent it leaves.
    pub async fn remove(&mut self, id: &str) -> Result<Vec<ComponentId>> {
        self.ensure_open()?;
        let parent = self.runtime.registry().get(id)?.parent().map(str::to_string);
        let ids = self.runtime.remove(id)?;
        self.outbox.push(ServerMessage::Removed { ids: ids.clone() });

        if let Some(parent) = parent {
            let dispatch = self.runtime.refresh(&parent).await;
            self.push_dispatch(dispatch);
        }
        Ok(ids)
    }

    fn push_dispatch(&self, dispatch: Dispatch) -> Vec<ComponentId> {
        let affected = dispatch.affected();
        for patch in dispatch.patches {
            self.outbox.push(patch.into());
        }
        for (id, err) in &dispatch.failures {
            self.outbox.push(ServerMessage::error(Some(id.clone()), err));
        }
        affected
    }

    /// Tear down every component. Idempotent.
    pub fn close(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }
        info!(
            session = self.id,
            components = self.runtime.registry().len(),
            "session closed"
        );
        self.runtime.clear();
        self.phase = Phase::Closed;
    }

    /// Handle one decoded client message.
    ///
    /// Errors are pushed to the client. Breaks once the session has closed.
    pub async fn handle(&mut self, msg: ClientMessage) -> ControlFlow<()> {
        match msg {
            ClientMessage::Join {
                component_type,
                props,
                parent,
            } => {
                let requested = props.get("id").and_then(crate::component::id_string);
                if let Err(err) = self.join(&component_type, props, parent.as_deref()).await {
                    self.report(requested.or(parent), &err);
                }
            }
            ClientMessage::Event {
                target_id,
                name,
                payload,
            } => {
                let event = Event::new(target_id.clone(), name).with_payload(payload);
                if let Err(err) = self.send(event).await {
                    self.report(Some(target_id), &err);
                }
            }
            ClientMessage::Remove { id } => {
                if let Err(err) = self.remove(&id).await {
                    self.report(Some(id), &err);
                }
            }
            ClientMessage::Leave => self.close(),
            ClientMessage::Ping => self.outbox.push(ServerMessage::Pong),
        }

        match self.phase {
            Phase::Closed => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    }

    /// Push an error message for a recoverable failure.
    pub fn report(&self, target_id: Option<ComponentId>, err: &ReactorError) {
        warn!(session = self.id, target = ?target_id, kind = ?err.kind(), error = %err, "request failed");
        self.outbox.push(ServerMessage::error(target_id, err));
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
