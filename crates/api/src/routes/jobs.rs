//! Route definitions for jobs.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted under `/api/v1`.
///
/// ```text
/// POST   /projects/{project_id}/jobs    -> submit_job
/// GET    /job-kinds                     -> list_job_kinds
/// POST   /job-events                    -> publish_job_event
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects/{project_id}/jobs", post(jobs::submit_job))
        .route("/job-kinds", get(jobs::list_job_kinds))
        .route("/job-events", post(jobs::publish_job_event))
}
