//! Server configuration.

use std::net::{SocketAddr, ToSocketAddrs};

use crate::error::{ReactorError, Result};

/// Default WebSocket port.
pub const DEFAULT_PORT: u16 = 8765;

/// Default largest accepted client message, in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1 << 20;

/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "reactor_core=info";

/// Settings of the WebSocket server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_message_size: usize,
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ServerConfig {
    /// Config listening on `host:port` with every other setting defaulted.
    pub fn bind(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Resolve the listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        if self.max_message_size == 0 {
            return Err(ReactorError::InvalidConfig(
                "max message size must be positive".into(),
            ));
        }
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ReactorError::InvalidConfig(format!("bad host {:?}: {e}", self.host)))?
            .next()
            .ok_or_else(|| ReactorError::InvalidConfig(format!("host {:?} resolved to nothing", self.host)))
    }
}
