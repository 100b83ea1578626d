use std::sync::Arc;

use cryoflow_events::EventBus;
use cryoflow_pipeline::SubmissionCoordinator;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Validates, builds, and hands jobs to the cluster.
    pub coordinator: SubmissionCoordinator,
    /// WebSocket connection manager (browser hubs).
    pub ws_manager: Arc<WsManager>,
    /// In-process fan-out of job status events.
    pub event_bus: Arc<EventBus>,
}
