//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler as fallback
//! - Wire up middleware (tracing, request ID)
//! - Resolve each inbound request against the current mapping table
//! - Hand resolved mappings to the pipe
//! - Swap the mapping table on config reload
//! - Run background tasks (cache sweeper) until shutdown

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::cache::{CacheStore, MemoryCache};
use crate::config::ProxyConfig;
use crate::http::request::{read_body, request_id, X_REQUEST_ID};
use crate::mapping::{InboundRequest, MappingError, MappingTable};
use crate::pipe::{HttpPipe, HyperUpstream, Upstream};

/// Errors raised while building or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid mappings: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Mappings(Vec<MappingError>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub mappings: Arc<ArcSwap<MappingTable>>,
    pub pipe: HttpPipe,
    pub max_body_size: usize,
}

/// HTTP server for aproxy.
pub struct HttpServer {
    state: AppState,
    config: ProxyConfig,
    memory_cache: Option<MemoryCache>,
}

impl HttpServer {
    /// Create a server with a pooled hyper client and, if enabled, an in-memory cache.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let memory_cache = config
            .cache
            .enabled
            .then(|| MemoryCache::new(config.cache.max_entries));
        let cache = memory_cache
            .clone()
            .map(|c| Arc::new(c) as Arc<dyn CacheStore>);

        let mut server = Self::with_parts(config, Arc::new(HyperUpstream::new()), cache)?;
        server.memory_cache = memory_cache;
        Ok(server)
    }

    /// Create a server around an explicit transport and cache store.
    pub fn with_parts(
        config: ProxyConfig,
        upstream: Arc<dyn Upstream>,
        cache: Option<Arc<dyn CacheStore>>,
    ) -> Result<Self, ServerError> {
        let table = MappingTable::from_config(&config.mappings).map_err(ServerError::Mappings)?;
        tracing::info!(mappings = table.len(), cache = cache.is_some(), "Mapping table compiled");

        let state = AppState {
            mappings: Arc::new(ArcSwap::from_pointee(table)),
            pipe: HttpPipe::new(upstream, cache),
            max_body_size: config.listener.max_body_size,
        };

        Ok(Self {
            state,
            config,
            memory_cache: None,
        })
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(self.state.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    /// Run the server until `shutdown` fires, applying config updates as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Some(cache) = self.memory_cache.clone() {
            let interval = self.config.cache.sweep_interval_secs;
            if interval > 0 {
                tokio::spawn(cache.run_sweeper(Duration::from_secs(interval), shutdown.resubscribe()));
            }
        }

        tokio::spawn(apply_config_updates(
            self.state.mappings.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));

        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Recompile and swap the mapping table for each config update.
async fn apply_config_updates(
    mappings: Arc<ArcSwap<MappingTable>>,
    mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                match MappingTable::from_config(&config.mappings) {
                    Ok(table) => {
                        tracing::info!(mappings = table.len(), "Mapping table reloaded");
                        mappings.store(Arc::new(table));
                    }
                    Err(errors) => {
                        for e in &errors {
                            tracing::error!(error = %e, "Rejected mapping update");
                        }
                    }
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// Resolve the inbound request to a mapping and pipe it.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let request_id = request_id(&parts.headers).to_string();

    let body = match read_body(body, state.max_body_size).await {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(request_id = %request_id, status = %rejection.0, "Rejected request body");
            return rejection.into_response();
        }
    };

    let table = state.mappings.load_full();
    let resolved = table.resolve(InboundRequest {
        method: &parts.method,
        path: parts.uri.path(),
        query: parts.uri.query(),
        headers: &parts.headers,
        body,
    });

    match resolved {
        Ok(Some(mapping)) => {
            tracing::debug!(request_id = %request_id, mapping = %mapping.name, "Mapping matched");
            state.pipe.pipe(&mapping).await
        }
        Ok(None) => {
            tracing::warn!(request_id = %request_id, path = %parts.uri.path(), "No mapping matched");
            (StatusCode::NOT_FOUND, "No matching mapping found").into_response()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Mapping resolution failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
