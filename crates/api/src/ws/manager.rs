use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Project selected by the client's `subscribe` frame. `None` until the
    /// first frame arrives; such connections receive nothing but pings.
    pub project_id: Option<String>,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    pub connected_at: DateTime<Utc>,
}

/// Manages all active WebSocket connections.
///
/// Thread-safe via interior `RwLock`; wrap in `Arc` and share.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            project_id: None,
            sender: tx,
            connected_at: Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection by its ID, returning it if it was registered.
    pub async fn remove(&self, conn_id: &str) -> Option<WsConnection> {
        self.connections.write().await.remove(conn_id)
    }

    /// Point `conn_id` at `project_id`, replacing any earlier selection.
    /// Returns `false` for an unknown connection.
    pub async fn set_project(&self, conn_id: &str, project_id: &str) -> bool {
        match self.connections.write().await.get_mut(conn_id) {
            Some(conn) => {
                conn.project_id = Some(project_id.to_string());
                true
            }
            None => false,
        }
    }

    pub async fn project_of(&self, conn_id: &str) -> Option<String> {
        self.connections
            .read()
            .await
            .get(conn_id)
            .and_then(|conn| conn.project_id.clone())
    }

    /// Send a message to every connection subscribed to `project_id`.
    ///
    /// Returns the number of connections the message was queued for. Closed
    /// channels are skipped; their handler removes them.
    pub async fn send_to_project(&self, project_id: &str, message: Message) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values() {
            if conn.project_id.as_deref() == Some(project_id)
                && conn.sender.send(message.clone()).is_ok()
            {
                count += 1;
            }
        }
        count
    }

    /// Connections currently subscribed to `project_id`.
    pub async fn project_connection_count(&self, project_id: &str) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|conn| conn.project_id.as_deref() == Some(project_id))
            .count()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
