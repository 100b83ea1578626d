use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use cryoflow_core::job_events::ClientFrame;

use crate::state::AppState;
use crate::ws::manager::WsManager;

/// HTTP handler that upgrades the connection to WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.ws_manager))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Registers the connection, spawns a sender task that drains the manager
/// channel into the sink, and reads client frames on the current task until
/// the peer goes away.
async fn handle_socket(socket: WebSocket, ws_manager: Arc<WsManager>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut rx = ws_manager.add(conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(text)) => handle_client_frame(&ws_manager, &conn_id, text.as_str()).await,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    if let Some(conn) = ws_manager.remove(&conn_id).await {
        let connected_secs = (chrono::Utc::now() - conn.connected_at).num_seconds();
        tracing::info!(conn_id = %conn_id, connected_secs, "WebSocket disconnected");
    }
    send_task.abort();
}

async fn handle_client_frame(ws_manager: &WsManager, conn_id: &str, text: &str) {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Subscribe { project_id }) if !project_id.trim().is_empty() => {
            ws_manager.set_project(conn_id, project_id.trim()).await;
            tracing::info!(conn_id = %conn_id, project_id = %project_id, "Client subscribed");
        }
        Ok(ClientFrame::Subscribe { .. }) => {
            tracing::debug!(conn_id = %conn_id, "Ignoring subscribe without project id");
        }
        Err(e) => {
            tracing::debug!(conn_id = %conn_id, error = %e, "Ignoring unrecognised client frame");
        }
    }
}
