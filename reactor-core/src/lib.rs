//! Reactor Core
//!
//! This crate provides the core runtime for Reactor, a server-driven live
//! component system. It implements:
//!
//! - A per-session component registry with explicit parent/child links
//! - A render cache keyed by a fingerprint of state and declared reads
//! - A markup diff engine producing small, ordered patches
//! - An event dispatcher routing client events to per-type handler tables
//! - A WebSocket transport that keeps each session strictly ordered
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `component`: component types, handler tables, the instance registry
//! - `graph`: dependency graph between external sources and components
//! - `render`: markup model, diff engine, patches and the render cache
//! - `store`: the persistence collaborator interface and an in-memory store
//! - `runtime` / `dispatch`: join, render passes and event dispatch
//! - `session`: the per-connection lifecycle and outbound queue
//! - `transport`: WebSocket server and wire protocol
//! - `page`: first full render for the initial HTTP response
//! - `todo`: reference TodoMVC components used by the server binary
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use reactor_core::{session::Session, store::MemoryStore, todo};
//!
//! let store = Arc::new(MemoryStore::new());
//! let (mut session, mut outbound) = Session::channel(Arc::new(todo::library()), store);
//!
//! let (list, markup) = session.join("x-todo-list", props, None).await?;
//! session.send(Event::new(&list, "add").with("new_item", "First task")).await?;
//! // outbound now holds the `joined` message followed by one list patch
//! ```

pub mod component;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod page;
pub mod render;
pub mod runtime;
pub mod session;
pub mod store;
pub mod todo;
pub mod transport;

pub use component::{ComponentId, ComponentLibrary, ComponentType};
pub use config::ServerConfig;
pub use dispatch::{ComponentPatch, Dispatch, Event};
pub use error::{ErrorKind, ReactorError, Result};
pub use runtime::Runtime;
pub use session::{Phase, Session};
