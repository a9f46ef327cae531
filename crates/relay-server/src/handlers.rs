//! Connection handlers for the relay server.
//!
//! This module owns the I/O half of each session: the authenticated
//! upgrade path and the per-connection socket loop that drives the
//! `relay-core` session state machine.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use relay_core::{
    Authenticator, BrokerId, ConnectionHandle, ConnectionRegistry, Outbound, Session,
    ShutdownCoordinator, TextDisposition,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Shared server state.
pub struct AppState {
    /// Live connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Allow-list authenticator.
    pub auth: Authenticator,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: &Config, registry: Arc<ConnectionRegistry>) -> Self {
        let auth = Authenticator::new(config.auth.allowed_brokers.iter().cloned());
        Self { registry, auth }
    }
}

/// Run the HTTP/WebSocket server until a termination signal has been
/// handled and every session is drained.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config, registry: Arc<ConnectionRegistry>) -> Result<()> {
    let grace = config.shutdown.grace();
    let state = Arc::new(AppState::new(&config, Arc::clone(&registry)));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            warn!("Failed to start metrics server: {}", e);
        }
    }

    // Build router
    let app = Router::new()
        .route("/broker_notifications", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    // Bind and serve
    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await?;

    info!("Relay listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/broker_notifications", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry, grace))
        .await?;

    Ok(())
}

/// Resolves once a termination signal has arrived and every registered
/// session has been closed, so axum stops accepting only after the drain.
async fn shutdown_signal(registry: Arc<ConnectionRegistry>, grace: Duration) {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");

    info!("Termination signal received");
    ShutdownCoordinator::with_grace(registry, grace)
        .shutdown()
        .await;
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// WebSocket upgrade handler.
///
/// Authentication happens here, before the upgrade: a request without a
/// valid `Authorization` credential is refused with `403 Forbidden`, and
/// no session or registry state ever exists for it.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let credential = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match state.auth.authenticate(credential) {
        Ok(broker) => {
            debug!(broker = %broker, "Handshake authorized");
            ws.on_upgrade(move |socket| handle_socket(socket, state, broker))
                .into_response()
        }
        Err(e) => {
            warn!(error = %e, "Handshake refused");
            metrics::record_error("unauthorized");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// Drive one broker connection from registration to close.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, broker: BrokerId) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    let (handle, mut commands) = ConnectionHandle::channel(broker);
    let broker = handle.broker().clone();
    let mut session = Session::new(Arc::clone(&state.registry), handle);
    session.open();

    // Split the WebSocket
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            biased;

            // Commands from the broadcaster and the shutdown coordinator.
            command = commands.recv() => match command {
                Some(Outbound::Event(event)) => {
                    metrics::record_event(event.payload_size());
                    if sender.send(Message::Text(event.as_str().to_owned())).await.is_err() {
                        session.begin_close();
                        break;
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    session.begin_close();
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    if let Err(e) = sender.send(Message::Close(Some(frame))).await {
                        debug!(broker = %broker, error = %e, "Close frame not sent");
                    }
                    break;
                }
                None => {
                    session.begin_close();
                    break;
                }
            },

            // Frames from the broker.
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if session.on_text(&text) == TextDisposition::CloseRequested {
                        if let Err(e) = sender.send(Message::Close(None)).await {
                            debug!(broker = %broker, error = %e, "Close frame not sent");
                        }
                        break;
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    debug!(broker = %broker, "Ignoring binary frame");
                }
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        session.begin_close();
                        break;
                    }
                }
                Some(Ok(Message::Pong(_))) => {
                    // Ignore pongs
                }
                Some(Ok(Message::Close(_))) => {
                    debug!(broker = %broker, "Received close frame");
                    session.begin_close();
                    break;
                }
                Some(Err(e)) => {
                    warn!(broker = %broker, error = %e, "WebSocket error");
                    metrics::record_error("websocket");
                    session.begin_close();
                    break;
                }
                None => {
                    debug!(broker = %broker, "WebSocket stream ended");
                    session.begin_close();
                    break;
                }
            }
        }
    }

    session.complete_close();
    debug!(broker = %broker, "WebSocket disconnected");
}
