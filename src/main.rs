//! aproxy
//!
//! Maps inbound HTTP requests onto upstream requests, optionally caching and
//! transforming the upstream response.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ mapping table ──▶ pipe ─────────────▶ Upstream
//!                                                        │  ▲
//!                                          cache lookup ─┘  └─ body, transform, cache store
//!     Client Response
//!     ◀──────────────────────────────────────────────── pipe ◀──────────── Upstream
//!
//!     Cross-cutting: config (TOML + hot reload), logging, lifecycle (signals, shutdown)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use aproxy::config::{load_config, ConfigWatcher, ProxyConfig};
use aproxy::observability::init_logging;
use aproxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "aproxy")]
#[command(about = "HTTP forwarding proxy with response caching and transforms", long_about = None)]
struct Cli {
    /// Path to the TOML config file. Watched for mapping changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "aproxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        mappings = config.mappings.len(),
        cache_enabled = config.cache.enabled,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    // The watcher stops when dropped, so it is held until the server returns.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_tx, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    if !shutdown.is_triggered() {
        tracing::warn!("Server stopped without a shutdown signal");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
