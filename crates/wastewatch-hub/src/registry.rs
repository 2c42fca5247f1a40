use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use wastewatch_core::ConnectionId;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(90);

/// A live WebSocket connection as the hub sees it.
pub struct Connection {
    pub id: ConnectionId,
    tx: mpsc::Sender<String>,
    connected: AtomicBool,
    last_pong: AtomicU64,
}

impl Connection {
    fn new(id: ConnectionId, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            tx,
            connected: AtomicBool::new(true),
            last_pong: AtomicU64::new(now_secs()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    pub fn is_alive(&self) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < CONNECTION_TIMEOUT.as_secs()
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Registry of all live connections with their outbound queues.
///
/// Delivery is fire-and-forget: enqueue onto the connection's bounded queue
/// and move on. A full queue drops the frame with a warn log; the hub never
/// blocks on a slow client.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<Connection>>,
    max_send_queue: usize,
}

impl ConnectionRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            connections: DashMap::new(),
            max_send_queue,
        }
    }

    /// Register a new connection and return its ID plus the outbound queue.
    pub fn register(&self) -> (ConnectionId, mpsc::Receiver<String>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let conn = Arc::new(Connection::new(id.clone(), tx));
        self.connections.insert(id.clone(), conn);
        (id, rx)
    }

    pub fn unregister(&self, id: &ConnectionId) {
        if let Some((_, conn)) = self.connections.remove(id) {
            conn.connected.store(false, Ordering::Relaxed);
        }
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Enqueue a frame for one connection. Returns false when the connection
    /// is gone or its queue is full.
    pub fn send_to(&self, id: &ConnectionId, frame: String) -> bool {
        let Some(conn) = self.get(id) else {
            return false;
        };
        match conn.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(frame)) => {
                tracing::warn!(
                    connection_id = %id,
                    frame_len = frame.len(),
                    "Send queue full, dropping frame"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn record_pong(&self, id: &ConnectionId) {
        if let Some(conn) = self.get(id) {
            conn.record_pong();
        }
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|e| e.key().clone()).collect()
    }

    /// Remove connections that stopped answering pings.
    pub fn cleanup_dead(&self) -> Vec<ConnectionId> {
        let dead: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|entry| !entry.value().is_alive())
            .map(|entry| entry.key().clone())
            .collect();

        for id in &dead {
            self.unregister(id);
            tracing::info!(connection_id = %id, "Cleaned up dead connection");
        }
        dead
    }

    #[cfg(test)]
    pub(crate) fn expire(&self, id: &ConnectionId) {
        if let Some(conn) = self.get(id) {
            conn.last_pong.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_unregister() {
        let registry = ConnectionRegistry::new(32);
        assert_eq!(registry.count(), 0);

        let (id1, _rx1) = registry.register();
        let (id2, _rx2) = registry.register();
        assert_eq!(registry.count(), 2);

        registry.unregister(&id1);
        assert_eq!(registry.count(), 1);

        registry.unregister(&id2);
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn send_to_delivers() {
        let registry = ConnectionRegistry::new(32);
        let (id, mut rx) = registry.register();

        assert!(registry.send_to(&id, "frame".into()));
        assert_eq!(rx.recv().await.unwrap(), "frame");
    }

    #[test]
    fn send_to_unknown_connection() {
        let registry = ConnectionRegistry::new(32);
        let ghost = ConnectionId::new();
        assert!(!registry.send_to(&ghost, "frame".into()));
    }

    #[test]
    fn send_to_full_queue_drops() {
        let registry = ConnectionRegistry::new(2);
        let (id, _rx) = registry.register();

        assert!(registry.send_to(&id, "one".into()));
        assert!(registry.send_to(&id, "two".into()));
        // Queue is full now
        assert!(!registry.send_to(&id, "three".into()));
    }

    #[test]
    fn cleanup_removes_expired() {
        let registry = ConnectionRegistry::new(32);
        let (stale, _rx1) = registry.register();
        let (fresh, _rx2) = registry.register();

        registry.expire(&stale);
        let dead = registry.cleanup_dead();

        assert_eq!(dead, vec![stale]);
        assert_eq!(registry.count(), 1);
        assert!(registry.get(&fresh).is_some());
    }

    #[test]
    fn pong_tracking() {
        let registry = ConnectionRegistry::new(32);
        let (id, _rx) = registry.register();

        let conn = registry.get(&id).unwrap();
        assert!(conn.is_alive());
        registry.record_pong(&id);
        assert!(conn.is_alive());
    }
}
