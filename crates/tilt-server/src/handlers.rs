//! HTTP routes and WebSocket upgrades for tilt-relay.

use crate::config::Config;
use crate::metrics;
use crate::session::{run_consumer_session, run_producer_session};
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tilt_core::{spawn_eviction_task, Hub};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Shared server state.
pub struct AppState {
    /// Producer state and connected consumers.
    pub hub: Arc<Hub>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let hub = Arc::new(Hub::with_config(config.hub_config()));
        Self::with_hub(config, hub)
    }

    /// Create app state around an existing hub.
    #[must_use]
    pub fn with_hub(config: Config, hub: Arc<Hub>) -> Self {
        Self { hub, config }
    }
}

/// Run the HTTP/WebSocket server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("tilt-relay listening on {}", addr);
    info!(
        "Producer endpoint: ws://{}{}",
        addr, config.endpoints.producer_path
    );
    info!(
        "Consumer endpoint: ws://{}{}",
        addr, config.endpoints.consumer_path
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    serve(listener, state, shutdown).await
}

/// Serve on an already bound listener until `shutdown` is cancelled.
///
/// Also runs the eviction loop for the state's hub.
///
/// # Errors
///
/// Returns an error if the HTTP server fails.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<()> {
    let eviction = spawn_eviction_task(
        Arc::clone(&state.hub),
        state.config.eviction.interval(),
        shutdown.clone(),
    );

    let app = router(state);
    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(cancelled(shutdown.clone()))
    .await;

    shutdown.cancel();
    if let Err(e) = eviction.await {
        warn!(error = %e, "Eviction task failed");
    }

    result.context("HTTP server failed")
}

/// Build the route table.
pub fn router(state: Arc<AppState>) -> Router {
    let producer_path = state.config.endpoints.producer_path.clone();
    let consumer_path = state.config.endpoints.consumer_path.clone();

    Router::new()
        .route(&producer_path, get(producer_ws_handler))
        .route(&consumer_path, get(consumer_ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

fn cancelled(token: CancellationToken) -> impl Future<Output = ()> {
    async move { token.cancelled().await }
}

async fn cancel_on_ctrl_c(token: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
            token.cancel();
        }
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.hub.stats();
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "producers": stats.producers,
        "consumers": stats.consumers,
    }))
}

/// Producer WebSocket upgrade handler.
async fn producer_ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!(peer = %peer, "Producer connection request");
    let hub = Arc::clone(&state.hub);
    upgrade(ws, peer, &state.config, "producer", move |socket| {
        run_producer_session(socket, hub, peer)
    })
}

/// Consumer WebSocket upgrade handler.
async fn consumer_ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!(peer = %peer, "Consumer connection request");
    let hub = Arc::clone(&state.hub);
    upgrade(ws, peer, &state.config, "consumer", move |socket| {
        run_consumer_session(socket, hub, peer)
    })
}

/// Complete an upgrade, logging and rejecting requests that cannot upgrade.
fn upgrade<F, Fut>(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    peer: SocketAddr,
    config: &Config,
    endpoint: &'static str,
    session: F,
) -> Response
where
    F: FnOnce(WebSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!(peer = %peer, endpoint, error = %rejection, "Failed to upgrade connection");
            metrics::record_error("upgrade");
            return rejection.into_response();
        }
    };

    ws.max_message_size(config.limits.max_message_size)
        .on_failed_upgrade(move |e| {
            warn!(peer = %peer, endpoint, error = %e, "WebSocket handshake failed");
            metrics::record_error("upgrade");
        })
        .on_upgrade(session)
}
