pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /projects/{project_id}/jobs                       submit (POST)
/// /job-kinds                                        list registered kinds (GET)
/// /job-events                                       scheduler status report (POST)
/// ```
///
/// The WebSocket endpoint lives at the root, see [`crate::router`].
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(jobs::router())
}
