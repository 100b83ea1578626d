//! Handlers for job submission, job kind discovery, and scheduler status
//! ingestion.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use cryoflow_core::builders::BuildResult;
use cryoflow_core::job_events::JobStatusEvent;
use cryoflow_core::params::ParamBag;
use cryoflow_core::types::{ActingUser, ProjectContext};
use cryoflow_pipeline::JobSpec;

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub kind: String,
    #[serde(default)]
    pub parameters: ParamBag,
    pub output_directory: String,
    #[serde(default)]
    pub job_name: String,
    #[serde(default)]
    pub user: Option<ActingUser>,
}

#[derive(Debug, Serialize)]
pub struct SubmittedJob {
    pub cluster_job_id: String,
    pub argv: Vec<String>,
    pub relative_output_path: String,
    pub job_name: String,
    pub supports_gpu: bool,
    pub supports_mpi: bool,
}

impl SubmittedJob {
    fn new(cluster_job_id: String, build: BuildResult) -> Self {
        Self {
            cluster_job_id,
            argv: build.argv,
            relative_output_path: build.relative_output_path,
            job_name: build.job_name,
            supports_gpu: build.supports_gpu,
            supports_mpi: build.supports_mpi,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobKindInfo {
    pub kind: &'static str,
    pub supports_gpu: bool,
    pub supports_mpi: bool,
}

#[derive(Debug, Serialize)]
pub struct PublishedEvent {
    /// Number of live bus receivers the event reached.
    pub receivers: usize,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve `project_id` to its directory under the configured projects root.
///
/// The id becomes a single path segment, so separators and dot segments are
/// rejected.
fn project_context(config: &ServerConfig, project_id: &str) -> AppResult<ProjectContext> {
    let unsafe_segment = project_id.is_empty()
        || project_id.starts_with('.')
        || project_id.contains(['/', '\\']);
    if unsafe_segment {
        return Err(AppError::BadRequest(format!(
            "Invalid project id: {project_id:?}"
        )));
    }
    Ok(ProjectContext::new(project_id, config.project_root(project_id)))
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{project_id}/jobs
///
/// Validate, build, and submit one job. Returns 201 with the cluster job id
/// and the rendered command.
pub async fn submit_job(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(input): Json<SubmitJobRequest>,
) -> AppResult<impl IntoResponse> {
    let project = project_context(&state.config, &project_id)?;
    let user = input.user.unwrap_or_default();
    let spec = JobSpec {
        kind: input.kind,
        parameters: input.parameters,
        output_directory: input.output_directory,
        job_name: input.job_name,
    };

    let result = state.coordinator.submit(spec, &project, &user).await?;

    tracing::info!(
        project_id = %project.project_id,
        cluster_job_id = %result.cluster_job_id,
        job_name = %result.build.job_name,
        user = %user.username,
        "Job submitted",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SubmittedJob::new(result.cluster_job_id, result.build),
        }),
    ))
}

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// GET /api/v1/job-kinds
pub async fn list_job_kinds(State(state): State<AppState>) -> Json<DataResponse<Vec<JobKindInfo>>> {
    let kinds = state
        .coordinator
        .registry()
        .capabilities()
        .into_iter()
        .map(|(kind, caps)| JobKindInfo {
            kind: kind.as_str(),
            supports_gpu: caps.supports_gpu,
            supports_mpi: caps.supports_mpi,
        })
        .collect();
    Json(DataResponse { data: kinds })
}

// ---------------------------------------------------------------------------
// Status ingestion
// ---------------------------------------------------------------------------

/// POST /api/v1/job-events
///
/// The scheduler reports a status change. The event is published on the
/// bus and relayed to every WebSocket subscribed to its project.
pub async fn publish_job_event(
    State(state): State<AppState>,
    Json(event): Json<JobStatusEvent>,
) -> AppResult<impl IntoResponse> {
    event.validate()?;

    tracing::debug!(
        job_id = %event.job_id,
        project_id = %event.project_id,
        status = ?event.status,
        "Job status reported",
    );
    let receivers = state.event_bus.publish(event);

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: PublishedEvent { receivers },
        }),
    ))
}
