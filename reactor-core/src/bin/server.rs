//! Reactor Server Binary
//!
//! Serves the TodoMVC components over WebSocket, backed by an in-memory store.
//!
//! # Usage
//!
//! ```bash
//! reactor-server --port 8765
//! reactor-server --host 0.0.0.0 --log reactor_core=debug
//! reactor-server --print-page
//! ```

use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use reactor_core::config::{DEFAULT_LOG_FILTER, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT};
use reactor_core::page::{render_page, PageRoot};
use reactor_core::store::{MemoryStore, Store};
use reactor_core::transport::Server;
use reactor_core::{todo, ServerConfig};

/// Reactor live component server
#[derive(Parser, Debug)]
#[command(name = "reactor-server")]
#[command(about = "Server-driven live components over WebSocket")]
struct Args {
    /// Host to bind to
    #[arg(long, env = "REACTOR_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "REACTOR_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Largest accepted client message, in bytes
    #[arg(long, env = "REACTOR_MAX_MESSAGE_SIZE", default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    max_message_size: usize,

    /// Tracing filter directive
    #[arg(long, env = "REACTOR_LOG", default_value = DEFAULT_LOG_FILTER)]
    log: String,

    /// Print the initial page markup and exit
    #[arg(long)]
    print_page: bool,
}

impl Args {
    fn config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            max_message_size: self.max_message_size,
            log_filter: self.log.clone(),
        }
    }
}

fn page_roots() -> Vec<PageRoot> {
    let props = |value: serde_json::Value| value.as_object().cloned().unwrap_or_default();
    vec![
        PageRoot::new("x-todo-list", props(json!({"id": "todos", "showing": "all"}))),
        PageRoot::new("x-todo-counter", props(json!({"id": "todos-counter"}))),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.config();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter)?)
        .init();

    let library = Arc::new(todo::library());
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());

    if args.print_page {
        println!("{}", render_page(library, store, &page_roots()).await?);
        return Ok(());
    }

    let server = Server::bind(&config, library, store).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    Ok(())
}
