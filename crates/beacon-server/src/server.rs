//! `BeaconServer`: Axum HTTP + WebSocket server and composition root.
//!
//! The server owns the [`ConnectionRegistry`] and installs the
//! [`Dispatcher`] into its [`DispatcherHandle`] when it starts listening.
//! Producers that were handed the handle earlier see
//! `DispatcherNotInitialized` until then.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use beacon_core::ConnectionId;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::api;
use crate::config::ServerConfig;
use crate::dispatcher::{Dispatcher, DispatcherHandle};
use crate::health::{self, HealthResponse};
use crate::metrics::{WS_CONNECTIONS_REJECTED_TOTAL, detached_handle, render};
use crate::registry::ConnectionRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::{SessionContext, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live connections and rooms.
    pub registry: Arc<ConnectionRegistry>,
    /// Dispatcher slot used by producer endpoints.
    pub dispatcher: DispatcherHandle,
    /// Shutdown signal and session tracker.
    pub shutdown: ShutdownCoordinator,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle rendered at `/metrics`.
    pub metrics: PrometheusHandle,
}

/// The Beacon notification server.
pub struct BeaconServer {
    config: Arc<ServerConfig>,
    registry: Arc<ConnectionRegistry>,
    dispatcher: DispatcherHandle,
    shutdown: ShutdownCoordinator,
    start_time: Instant,
    metrics: PrometheusHandle,
}

impl BeaconServer {
    /// Create a server with an empty registry and no dispatcher installed.
    pub fn new(config: ServerConfig) -> Self {
        let registry = ConnectionRegistry::with_max_connections(config.max_connections);
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            dispatcher: DispatcherHandle::new(),
            shutdown: ShutdownCoordinator::new(),
            start_time: Instant::now(),
            metrics: detached_handle(),
        }
    }

    /// Render `/metrics` from `handle` (usually the global recorder).
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = handle;
        self
    }

    /// Share a dispatcher slot that producers already hold.
    #[must_use]
    pub fn with_dispatcher_handle(mut self, handle: DispatcherHandle) -> Self {
        self.dispatcher = handle;
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: Arc::clone(&self.registry),
            dispatcher: self.dispatcher.clone(),
            shutdown: self.shutdown.clone(),
            config: Arc::clone(&self.config),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/api/alerts/test", post(api::test_alert))
            .route("/api/alerts", post(api::broadcast_alert))
            .route("/api/notifications", post(api::send_notification))
            .with_state(state)
            .layer(CorsLayer::permissive())
    }

    /// Install a dispatcher over this server's registry.
    ///
    /// Returns `false` if the handle already held one.
    pub fn install_dispatcher(&self) -> bool {
        let installed = self
            .dispatcher
            .install(Arc::new(Dispatcher::new(Arc::clone(&self.registry))));
        if installed {
            info!("dispatcher installed");
        } else {
            warn!("dispatcher already installed, keeping existing");
        }
        installed
    }

    /// Bind, install the dispatcher, and serve until shutdown.
    ///
    /// Returns the bound address and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        let _ = self.install_dispatcher();

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server error");
            }
        });

        info!(%local_addr, "beacon server listening");
        Ok((local_addr, handle))
    }

    /// Signal shutdown and wait for sessions to drain.
    pub async fn shutdown_gracefully(&self) -> bool {
        self.shutdown
            .graceful_shutdown(self.config.shutdown_timeout())
            .await
    }

    /// Dispatcher slot handed to producers.
    pub fn dispatcher(&self) -> &DispatcherHandle {
        &self.dispatcher
    }

    /// Connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server shutting down").into_response();
    }
    // Fast refusal before the upgrade; the registry enforces the cap exactly.
    let live = state.registry.connection_count();
    if live >= state.config.max_connections {
        counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        warn!(live, max = state.config.max_connections, "connection limit reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    }

    let ctx = SessionContext {
        registry: Arc::clone(&state.registry),
        send_queue_capacity: state.config.send_queue_capacity,
        keepalive_interval: state.config.keepalive_interval(),
        shutdown: state.shutdown.token(),
    };
    let tracker = state.shutdown.tracker().clone();
    let connection_id = ConnectionId::new();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| tracker.track_future(run_ws_session(socket, connection_id, ctx)))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.dispatcher.is_initialized(),
        state.registry.connection_count(),
        state.registry.room_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        render(&state.metrics),
    )
}
