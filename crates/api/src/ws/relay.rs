use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::broadcast;

use cryoflow_core::job_events::{job_update_frame, JobStatusEvent};

use crate::ws::manager::WsManager;

/// Spawn the task that forwards bus events to subscribed connections as
/// `job_update` frames.
///
/// The task ends when the event bus is dropped.
pub fn start_relay(
    ws_manager: Arc<WsManager>,
    mut receiver: broadcast::Receiver<JobStatusEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => relay_event(&ws_manager, &event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Job event relay lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, job event relay shutting down");
                    break;
                }
            }
        }
    })
}

async fn relay_event(ws_manager: &WsManager, event: &JobStatusEvent) {
    let frame = match job_update_frame(event) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(job_id = %event.job_id, error = %e, "Failed to encode job update");
            return;
        }
    };
    let delivered = ws_manager
        .send_to_project(&event.project_id, Message::Text(frame.into()))
        .await;
    tracing::debug!(
        job_id = %event.job_id,
        project_id = %event.project_id,
        delivered,
        "Relayed job update",
    );
}
