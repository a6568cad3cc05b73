//! Outbound half of a live WebSocket connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use beacon_core::ConnectionId;
use tokio::sync::mpsc;

/// A connected client as seen by the registry and dispatcher.
///
/// Holds only the send side of the per-connection queue; the session task
/// owns the socket and drains the queue in order, so frames queued for one
/// connection are written in submission order.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Queue feeding the session's socket writer.
    tx: mpsc::Sender<Arc<String>>,
    /// When the session registered this connection.
    connected_at: Instant,
    /// Frames dropped because the queue was full or closed.
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a connection around the session's outbound queue.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            tx,
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Queue a frame without waiting.
    ///
    /// Returns `false` if the queue is full or the session is gone; the
    /// frame is then dropped and counted.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Time since the connection was created.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ClientConnection::new(ConnectionId::from("conn_1"), tx), rx)
    }

    #[tokio::test]
    async fn send_preserves_order() {
        let (conn, mut rx) = make_connection(8);
        for i in 0..5 {
            assert!(conn.send(Arc::new(format!("frame_{i}"))));
        }
        for i in 0..5 {
            assert_eq!(*rx.recv().await.unwrap(), format!("frame_{i}"));
        }
        assert_eq!(conn.drop_count(), 0);
    }

    #[test]
    fn send_to_closed_queue_drops() {
        let (conn, rx) = make_connection(8);
        drop(rx);
        assert!(!conn.send(Arc::new("late".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn send_to_full_queue_drops() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.send(Arc::new("first".into())));
        assert!(!conn.send(Arc::new("second".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn age_grows() {
        let (conn, _rx) = make_connection(1);
        std::thread::sleep(Duration::from_millis(10));
        assert!(conn.age() >= Duration::from_millis(10));
    }
}
