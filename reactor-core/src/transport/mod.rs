//! Reactor WebSocket transport
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         Server                                │
//! │  TcpListener ──accept──► connection task (one per client)     │
//! │                            │                                  │
//! │                 frames ──► Session::handle ──► outbound queue │
//! │                            │                         │        │
//! │                            └──── encode (JSON/MsgPack)┘       │
//! │                                        │                      │
//! │                                  writer task ──► WebSocket    │
//! │                                                               │
//! │  SessionTable (DashMap): live sessions, for logs/introspection│
//! └───────────────────────────────────────────────────────────────┘
//! ```

mod connection;
pub mod protocol;
mod server;

pub use protocol::{ClientMessage, Codec, ServerMessage};
pub use server::{Server, SessionInfo, SessionTable};
