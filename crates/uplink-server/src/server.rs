//! WebSocket transport adapter.
//!
//! Owns connection establishment, framing, liveness, and teardown. The sync
//! engine sees none of this: it gets a session handle when a client
//! subscribes to the sync channel and a removal notification when the
//! connection goes away.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use uplink_core::ids::SessionId;
use uplink_core::transport::{SessionHandle, SessionSlot};
use uplink_sync::SyncService;

use crate::channels::{ChannelRegistry, SYNC_CHANNEL};
use crate::session::ChannelSession;

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub max_send_queue: usize,
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9090,
            max_send_queue: 256,
            heartbeat_interval: Duration::from_secs(30),
            client_timeout: Duration::from_secs(90),
        }
    }
}

/// Shared state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    service: Arc<SyncService>,
    slot: Arc<SessionSlot>,
    channels: Arc<ChannelRegistry>,
    live: Arc<DashMap<SessionId, Arc<ChannelSession>>>,
    max_send_queue: usize,
    heartbeat_interval: Duration,
    client_timeout: Duration,
}

/// Requests a client sends over the WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientRequest {
    /// Subscribe to a named channel. The optional browser string describes
    /// the frontend for diagnostics.
    Subscribe {
        channel: String,
        #[serde(default)]
        browser: Option<String>,
    },
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps it alive.
pub async fn start(
    config: ServerConfig,
    service: Arc<SyncService>,
    slot: Arc<SessionSlot>,
) -> Result<ServerHandle, std::io::Error> {
    let channels = Arc::new(ChannelRegistry::new());
    channels.register_persistent(SYNC_CHANNEL);

    let state = AppState {
        service,
        slot,
        channels,
        live: Arc::new(DashMap::new()),
        max_send_queue: config.max_send_queue,
        heartbeat_interval: config.heartbeat_interval,
        client_timeout: config.client_timeout,
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "Uplink server started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server,
    })
}

/// Handle returned by `start()` — keeps the accept loop alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a new WebSocket connection for its whole lifetime.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (session, mut rx) = ChannelSession::new(state.max_send_queue);
    state.live.insert(session.id().clone(), Arc::clone(&session));
    tracing::info!(session = %session.id(), "WebSocket client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer task: drain the outbound queue, heartbeat, watch liveness.
    let writer_session = Arc::clone(&session);
    let heartbeat_interval = state.heartbeat_interval;
    let client_timeout = state.client_timeout;
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat_interval);
        ping_interval.tick().await; // consume first immediate tick
        let mut timed_out = false;

        loop {
            tokio::select! {
                frame = rx.recv() => {
                    match frame {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if writer_session.is_removed() {
                        break;
                    }
                    if !writer_session.is_alive(client_timeout) {
                        tracing::warn!(session = %writer_session.id(), "Client missed heartbeats");
                        timed_out = true;
                        break;
                    }
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(session = %writer_session.id(), "Sent ping");
                }
            }
        }
        timed_out
    });

    // Reader task: dispatch client requests, track pongs.
    let reader_session = Arc::clone(&session);
    let reader_state = state.clone();
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => handle_request(&reader_state, &reader_session, &text),
                WsMessage::Pong(_) => reader_session.record_pong(),
                WsMessage::Close(_) => break,
                WsMessage::Ping(_) => {} // axum answers pongs automatically
                _ => {}
            }
        }
    });

    // First side to finish tears the connection down.
    let timed_out = tokio::select! {
        result = writer => result.unwrap_or(false),
        _ = reader => false,
    };

    state.live.remove(session.id());
    state.slot.clear(session.id());
    session.notify_removed(timed_out);
    tracing::info!(session = %session.id(), timed_out, "WebSocket client disconnected");
}

/// Dispatch one parsed client request on the transport's reader task.
fn handle_request(state: &AppState, session: &Arc<ChannelSession>, raw: &str) {
    let request: ClientRequest = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(error) => {
            tracing::warn!(session = %session.id(), %error, "Unparseable client request");
            return;
        }
    };

    match request {
        ClientRequest::Subscribe { channel, browser } => {
            if !state.channels.is_registered(&channel) {
                tracing::warn!(session = %session.id(), channel = %channel, "Subscribe to unknown channel rejected");
                return;
            }
            if channel != SYNC_CHANNEL {
                tracing::debug!(session = %session.id(), channel = %channel, "Ignoring non-sync subscription");
                return;
            }
            if let Some(browser) = browser {
                state.service.set_browser_type(browser);
            }

            let handle: Arc<dyn SessionHandle> = session.clone();
            if let Some(displaced) = state.slot.install(Arc::clone(&handle)) {
                if displaced.id() != session.id() {
                    tracing::info!(
                        displaced = %displaced.id(),
                        session = %session.id(),
                        "Replacing previous client session"
                    );
                    if let Some((_, old)) = state.live.remove(displaced.id()) {
                        old.notify_removed(false);
                    }
                }
            }
            state.service.on_client_subscribe(handle);
        }
    }
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "client_connected": state.slot.current().is_some(),
        "client_synced": state.service.is_client_synced(),
        "browser_type": state.service.browser_type(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplink_core::model::MemoryModel;
    use uplink_sync::testing::RecordingStrategy;
    use uplink_sync::SchedulerConfig;

    fn test_state() -> (AppState, Arc<RecordingStrategy>) {
        let strategy = RecordingStrategy::new();
        let model = Arc::new(MemoryModel::new());
        let slot = Arc::new(SessionSlot::new());
        let service = Arc::new(SyncService::new(
            strategy.clone(),
            model,
            Arc::clone(&slot),
            SchedulerConfig::default(),
        ));

        let channels = Arc::new(ChannelRegistry::new());
        channels.register_persistent(SYNC_CHANNEL);

        let state = AppState {
            service,
            slot,
            channels,
            live: Arc::new(DashMap::new()),
            max_send_queue: 32,
            heartbeat_interval: Duration::from_secs(30),
            client_timeout: Duration::from_secs(90),
        };
        (state, strategy)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn subscribe_request_parses() {
        let raw = r#"{"type":"subscribe","channel":"sync","browser":"firefox"}"#;
        let request: ClientRequest = serde_json::from_str(raw).unwrap();
        let ClientRequest::Subscribe { channel, browser } = request;
        assert_eq!(channel, "sync");
        assert_eq!(browser.as_deref(), Some("firefox"));
    }

    #[test]
    fn subscribe_request_browser_is_optional() {
        let raw = r#"{"type":"subscribe","channel":"sync"}"#;
        let request: ClientRequest = serde_json::from_str(raw).unwrap();
        let ClientRequest::Subscribe { browser, .. } = request;
        assert!(browser.is_none());
    }

    #[tokio::test]
    async fn subscribe_installs_session_and_triggers_full_sync() {
        let (state, strategy) = test_state();
        let (session, _rx) = ChannelSession::new(32);
        state.live.insert(session.id().clone(), Arc::clone(&session));

        handle_request(
            &state,
            &session,
            r#"{"type":"subscribe","channel":"sync","browser":"chrome"}"#,
        );
        settle().await;

        assert_eq!(state.slot.current().unwrap().id(), session.id());
        assert_eq!(state.service.browser_type(), "chrome");
        assert!(state.service.is_client_synced());

        let calls = strategy.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, uplink_core::events::SyncPath::All);
    }

    #[tokio::test]
    async fn subscribe_to_unknown_channel_is_rejected() {
        let (state, strategy) = test_state();
        let (session, _rx) = ChannelSession::new(32);

        handle_request(&state, &session, r#"{"type":"subscribe","channel":"nope"}"#);
        settle().await;

        assert!(state.slot.current().is_none());
        assert!(strategy.is_empty());
    }

    #[tokio::test]
    async fn garbage_request_is_ignored() {
        let (state, strategy) = test_state();
        let (session, _rx) = ChannelSession::new(32);

        handle_request(&state, &session, "not json at all");
        settle().await;

        assert!(state.slot.current().is_none());
        assert!(strategy.is_empty());
    }

    #[tokio::test]
    async fn second_subscriber_displaces_the_first() {
        let (state, _strategy) = test_state();
        let (first, _rx1) = ChannelSession::new(32);
        let (second, _rx2) = ChannelSession::new(32);
        state.live.insert(first.id().clone(), Arc::clone(&first));
        state.live.insert(second.id().clone(), Arc::clone(&second));

        handle_request(&state, &first, r#"{"type":"subscribe","channel":"sync"}"#);
        settle().await;
        handle_request(&state, &second, r#"{"type":"subscribe","channel":"sync"}"#);
        settle().await;

        assert_eq!(state.slot.current().unwrap().id(), second.id());
        assert!(first.is_removed());
        assert!(!second.is_removed());
    }

    #[tokio::test]
    async fn server_starts_and_serves_health() {
        let (state, _strategy) = test_state();
        let config = ServerConfig {
            port: 0, // random port
            ..Default::default()
        };

        let handle = start(config, Arc::clone(&state.service), Arc::clone(&state.slot))
            .await
            .unwrap();
        assert!(handle.port > 0);

        let url = format!("http://127.0.0.1:{}/health", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["client_connected"], false);
        assert_eq!(body["client_synced"], false);
        assert_eq!(body["browser_type"], "unknown");
    }

    #[test]
    fn build_router_creates_routes() {
        let (state, _strategy) = test_state();
        let _router = build_router(state);
        // If this doesn't panic, the router was built successfully
    }
}
