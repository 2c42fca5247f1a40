use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::router::EventRouter;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const OUTBOUND_QUEUE: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,
}

/// Observable lifecycle of the push channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Client transport configuration.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub endpoint: String,
    /// Automatic reconnect attempts before the session goes terminal.
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl TransportConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            max_retries: 5,
            retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(10),
        }
    }
}

/// Connection-scoped sender for room membership requests.
///
/// Each (re)connect mints a fresh handle; one kept from a previous
/// connection points at a closed queue and its joins go nowhere, which is
/// exactly the membership-dies-with-the-connection contract.
#[derive(Clone)]
pub struct RoomHandle {
    tx: mpsc::Sender<String>,
}

impl RoomHandle {
    pub fn join_admin(&self) -> Result<(), TransportError> {
        self.send(r#"{"event":"joinAdmin"}"#.to_string())
    }

    pub fn join_user(&self, user_id: &str) -> Result<(), TransportError> {
        let frame = serde_json::json!({
            "event": "joinUser",
            "payload": { "userId": user_id },
        });
        self.send(frame.to_string())
    }

    fn send(&self, frame: String) -> Result<(), TransportError> {
        self.tx.try_send(frame).map_err(|_| TransportError::NotConnected)
    }
}

struct Inner {
    config: TransportConfig,
    router: Arc<EventRouter>,
    status: Mutex<ConnectionStatus>,
    current: Mutex<Option<RoomHandle>>,
    on_connect: RwLock<Option<Box<dyn Fn(RoomHandle) + Send + Sync>>>,
    cancel: Mutex<CancellationToken>,
}

/// One bidirectional push channel to the hub, with bounded automatic
/// reconnect.
///
/// Room membership does not survive a reconnect: the hub scopes membership
/// to the connection, so the `on_connect` hook must re-issue join calls on
/// the fresh handle it receives. No join frames are sent while a reconnect
/// attempt is pending.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

impl Transport {
    pub fn new(config: TransportConfig, router: Arc<EventRouter>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                router,
                status: Mutex::new(ConnectionStatus::Disconnected),
                current: Mutex::new(None),
                on_connect: RwLock::new(None),
                cancel: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    /// Hook invoked after every successful (re)connect with a fresh
    /// connection-scoped handle. Re-issue `join_admin`/`join_user` here.
    pub fn on_connect(&self, hook: impl Fn(RoomHandle) + Send + Sync + 'static) {
        *self.inner.on_connect.write() = Some(Box::new(hook));
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.lock()
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.inner.router
    }

    /// Establish the push channel. Idempotent: a no-op while connected or
    /// connecting. After retries are exhausted the session sits in
    /// `Disconnected` until this is called again.
    pub fn connect(&self) {
        {
            let mut status = self.inner.status.lock();
            if *status != ConnectionStatus::Disconnected {
                return;
            }
            *status = ConnectionStatus::Connecting;
        }

        let cancel = CancellationToken::new();
        *self.inner.cancel.lock() = cancel.clone();

        let inner = Arc::clone(&self.inner);
        tokio::spawn(run_loop(inner, cancel));
    }

    /// Tear down the channel, stop the reconnect loop, and clear all
    /// registered event listeners so no handler leaks across reconnect
    /// cycles.
    pub fn disconnect(&self) {
        self.inner.cancel.lock().cancel();
        *self.inner.current.lock() = None;
        *self.inner.status.lock() = ConnectionStatus::Disconnected;
        self.inner.router.clear();
        tracing::info!("Transport disconnected");
    }

    /// Join the admin room on the current connection.
    pub fn join_admin(&self) -> Result<(), TransportError> {
        self.handle().ok_or(TransportError::NotConnected)?.join_admin()
    }

    /// Join this user's private room on the current connection.
    pub fn join_user(&self, user_id: &str) -> Result<(), TransportError> {
        self.handle()
            .ok_or(TransportError::NotConnected)?
            .join_user(user_id)
    }

    /// The handle for the current connection, if one is live.
    pub fn handle(&self) -> Option<RoomHandle> {
        self.inner.current.lock().clone()
    }
}

/// Connect, drive, and reconnect until cancelled or retries run out.
async fn run_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        match connect_async(&inner.config.endpoint).await {
            Ok((ws, _)) => {
                attempts = 0;
                let (out_tx, out_rx) = mpsc::channel(OUTBOUND_QUEUE);
                let handle = RoomHandle { tx: out_tx };
                *inner.current.lock() = Some(handle.clone());
                *inner.status.lock() = ConnectionStatus::Connected;
                tracing::info!(endpoint = %inner.config.endpoint, "Transport connected");

                {
                    let hook = inner.on_connect.read();
                    if let Some(hook) = hook.as_ref() {
                        hook(handle);
                    }
                }

                drive(ws, out_rx, &inner.router, &cancel).await;

                // Once cancelled, disconnect() owns the shared state; writing
                // here could clobber a successor loop that already connected.
                if cancel.is_cancelled() {
                    break;
                }
                *inner.current.lock() = None;
                *inner.status.lock() = ConnectionStatus::Connecting;
                tracing::warn!("Connection lost, reconnecting");
            }
            Err(err) => {
                attempts += 1;
                if attempts > inner.config.max_retries {
                    tracing::error!(
                        error = %err,
                        attempts,
                        "Reconnect retries exhausted, transport going terminal"
                    );
                    break;
                }
                let delay = backoff_delay(&inner.config, attempts);
                tracing::warn!(
                    error = %err,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Connect failed, retrying"
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    if !cancel.is_cancelled() {
        *inner.current.lock() = None;
        *inner.status.lock() = ConnectionStatus::Disconnected;
    }
}

/// Pump one live connection: outbound join frames out, inbound events into
/// the router. Returns when the peer closes, an error occurs, or the
/// transport is cancelled.
async fn drive(
    ws: WsStream,
    mut out_rx: mpsc::Receiver<String>,
    router: &EventRouter,
    cancel: &CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            frame = out_rx.recv() => {
                match frame {
                    Some(text) => {
                        if ws_tx.send(Message::text(text)).await.is_err() {
                            return;
                        }
                    }
                    None => return,
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => router.dispatch_frame(text.as_str()),
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(_)) => {} // pings/pongs handled by tungstenite
                    Some(Err(err)) => {
                        tracing::warn!(error = %err, "WebSocket read error");
                        return;
                    }
                }
            }
            _ = cancel.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                return;
            }
        }
    }
}

/// Capped exponential backoff: retry_delay * 2^(attempt-1), clamped.
fn backoff_delay(config: &TransportConfig, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    config
        .retry_delay
        .saturating_mul(1u32 << exp)
        .min(config.max_retry_delay)
}
