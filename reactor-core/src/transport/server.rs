//! WebSocket server
//!
//! Accepts connections and runs one session task per connection. The server
//! keeps a table of live sessions for logging and introspection; components
//! live only inside their session.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::net::TcpListener;

use super::connection::{handle_connection, ConnectionContext};
use crate::component::ComponentLibrary;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::session::SessionId;
use crate::store::Store;

/// What the server knows about a live session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub peer: SocketAddr,
    pub opened_at: Instant,
}

impl SessionInfo {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            opened_at: Instant::now(),
        }
    }
}

/// Shared table of live sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    inner: Arc<DashMap<SessionId, SessionInfo>>,
}

impl SessionTable {
    pub fn insert(&self, id: SessionId, info: SessionInfo) {
        self.inner.insert(id, info);
    }

    pub fn remove(&self, id: SessionId) -> Option<SessionInfo> {
        self.inner.remove(&id).map(|(_, info)| info)
    }

    pub fn get(&self, id: SessionId) -> Option<SessionInfo> {
        self.inner.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.inner.iter().map(|entry| *entry.key()).collect()
    }
}

/// A bound WebSocket server.
pub struct Server {
    listener: TcpListener,
    ctx: Arc<ConnectionContext>,
}

impl Server {
    /// Bind the listener described by `config`.
    pub async fn bind(config: &ServerConfig, library: Arc<ComponentLibrary>, store: Arc<dyn Store>) -> Result<Self> {
        let addr = config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Reactor listening on ws://{}", listener.local_addr()?);

        Ok(Self {
            listener,
            ctx: Arc::new(ConnectionContext {
                library,
                store,
                max_message_size: config.max_message_size,
                sessions: SessionTable::default(),
            }),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle onto the live session table.
    pub fn sessions(&self) -> SessionTable {
        self.ctx.sessions.clone()
    }

    pub fn active_sessions(&self) -> usize {
        self.ctx.sessions.len()
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` completes.
    ///
    /// Sessions already running are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutting down, {} session(s) still open", self.ctx.sessions.len());
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            tracing::debug!("Accepted connection from {}", peer);
                            let ctx = Arc::clone(&self.ctx);
                            tokio::spawn(async move {
                                handle_connection(stream, peer, ctx).await;
                            });
                        }
                        Err(e) => {
                            tracing::warn!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }
    }
}
