use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use wastewatch_core::{ConnectionId, Room};

use crate::broadcast::BroadcastHub;
use crate::registry::ConnectionRegistry;
use crate::rooms::RoomRegistry;
use crate::wire::ClientCommand;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub max_send_queue: usize,
    pub cleanup_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9400,
            max_send_queue: 256,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: BroadcastHub,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps the background
/// tasks alive and exposes the hub to mutation producers.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, std::io::Error> {
    let connections = Arc::new(ConnectionRegistry::new(config.max_send_queue));
    let rooms = Arc::new(RoomRegistry::new());
    let hub = BroadcastHub::new(Arc::clone(&connections), Arc::clone(&rooms));

    let cleanup = start_cleanup_task(Arc::clone(&connections), Arc::clone(&rooms), config.cleanup_interval);

    let router = build_router(AppState { hub: hub.clone() });
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "WasteWatch hub started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        hub,
        _server: server,
        _cleanup: cleanup,
    })
}

/// Handle returned by `start()`. Dropping it leaves the spawned tasks
/// running; it mainly exists to hand producers the hub and tests the port.
pub struct ServerHandle {
    pub port: u16,
    pub hub: BroadcastHub,
    _server: tokio::task::JoinHandle<()>,
    _cleanup: tokio::task::JoinHandle<()>,
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (connection_id, rx) = state.hub.connections().register();
    tracing::info!(connection_id = %connection_id, "Client connected");

    handle_ws_connection(socket, connection_id, rx, state.hub).await;
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "connections": state.hub.connections().count(),
        "rooms": state.hub.rooms().room_count(),
    }))
}

/// Drive one WebSocket connection: split into reader/writer tasks, apply
/// join commands, and tear down room membership synchronously on disconnect.
async fn handle_ws_connection(
    socket: WebSocket,
    connection_id: ConnectionId,
    mut rx: mpsc::Receiver<String>,
    hub: BroadcastHub,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: forward queued frames + periodic ping
    let writer_cid = connection_id.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping_interval.tick().await; // consume first immediate tick

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
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(connection_id = %writer_cid, "Sent ping");
                }
            }
        }
    });

    // Reader: apply join commands, track pongs. Joins are handled inline so
    // they stay ordered with this connection's disconnect.
    let reader_cid = connection_id.clone();
    let reader_hub = hub.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => match ClientCommand::parse(text.as_str()) {
                    Ok(ClientCommand::JoinAdmin) => {
                        reader_hub.rooms().join(&reader_cid, &Room::Admins);
                    }
                    Ok(ClientCommand::JoinUser { user_id }) => {
                        reader_hub.rooms().join(&reader_cid, &Room::user(user_id));
                    }
                    Err(err) => {
                        tracing::warn!(
                            connection_id = %reader_cid,
                            error = %err,
                            "Dropping unrecognized inbound frame"
                        );
                    }
                },
                WsMessage::Pong(_) => {
                    reader_hub.connections().record_pong(&reader_cid);
                }
                WsMessage::Close(_) => break,
                WsMessage::Ping(_) => {} // axum replies with pong automatically
                _ => {}
            }
        }
    });

    // Either half ending tears the whole socket down, so a server-side
    // unregister (which closes the outbound queue) also closes the TCP side.
    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    // Membership dies with the connection, before any further broadcast.
    hub.rooms().leave_all(&connection_id);
    hub.connections().unregister(&connection_id);
    tracing::info!(connection_id = %connection_id, "Client disconnected");
}

/// Periodically drop connections that stopped answering pings, including
/// their room memberships.
fn start_cleanup_task(
    connections: Arc<ConnectionRegistry>,
    rooms: Arc<RoomRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let dead = connections.cleanup_dead();
            for id in &dead {
                rooms.leave_all(id);
            }
            if !dead.is_empty() {
                tracing::info!(removed = dead.len(), "Dead connection cleanup");
            }
        }
    })
}
