//! Validate, build, and hand a job off to the cluster.
//!
//! [`SubmissionCoordinator`] is the one entry point for turning a
//! [`JobSpec`] into a running cluster job. It does not queue, retry, or
//! schedule anything itself; the [`ClusterSubmitter`] it is given does the
//! actual hand-off.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cryoflow_core::builders::{BuildResult, BuilderContext, BuilderRegistry, ValidatedJob};
use cryoflow_core::error::CoreError;
use cryoflow_core::params::ParamBag;
use cryoflow_core::types::{ActingUser, ProjectContext};

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// A user's request to run one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Job kind name, e.g. `"JoinStar"`.
    pub kind: String,
    #[serde(default)]
    pub parameters: ParamBag,
    /// Where the job writes its output; absolute inside the project root, or
    /// relative to it.
    pub output_directory: String,
    #[serde(default)]
    pub job_name: String,
}

/// What the cluster collaborator receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub build: BuildResult,
    pub project: ProjectContext,
    pub user: ActingUser,
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
    /// Opaque identifier returned by the cluster.
    pub cluster_job_id: String,
    pub build: BuildResult,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure reported by a [`ClusterSubmitter`].
#[derive(Debug, thiserror::Error)]
pub enum SubmitterError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cluster submission timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Cluster rejected the job (exit code {exit_code}): {stderr}")]
    Rejected { exit_code: i32, stderr: String },

    #[error("Could not read a job id from cluster response: {0:?}")]
    UnparsableResponse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Unknown job kind: {0}")]
    UnknownJobKind(String),

    /// User-facing validation message from the builder.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The command could not be rendered, e.g. the output directory lies
    /// outside the project.
    #[error("Failed to build command: {0}")]
    Build(CoreError),

    #[error(transparent)]
    Submitter(#[from] SubmitterError),
}

impl From<CoreError> for SubmissionError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownJobKind(kind) => Self::UnknownJobKind(kind),
            CoreError::Validation(message) => Self::Validation(message),
            other => Self::Build(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Cluster collaborator
// ---------------------------------------------------------------------------

/// Hands a rendered command to the cluster batch system.
#[async_trait]
pub trait ClusterSubmitter: Send + Sync {
    /// Submit and return the cluster's job identifier.
    async fn submit(&self, request: &SubmissionRequest) -> Result<String, SubmitterError>;
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SubmissionCoordinator {
    registry: Arc<BuilderRegistry>,
    submitter: Arc<dyn ClusterSubmitter>,
}

impl SubmissionCoordinator {
    pub fn new(registry: BuilderRegistry, submitter: Arc<dyn ClusterSubmitter>) -> Self {
        Self {
            registry: Arc::new(registry),
            submitter,
        }
    }

    pub fn registry(&self) -> &BuilderRegistry {
        &self.registry
    }

    /// Resolve, validate, build, and submit `spec`.
    ///
    /// Nothing is built when validation fails and nothing is submitted when
    /// building fails. Submitter errors are returned unchanged.
    pub async fn submit(
        &self,
        spec: JobSpec,
        project: &ProjectContext,
        user: &ActingUser,
    ) -> Result<SubmissionResult, SubmissionError> {
        let ctx = BuilderContext::new(spec.parameters, project.clone(), user.clone());
        let builder = self.registry.resolve(&spec.kind, ctx)?;
        let kind = builder.kind();

        let job = ValidatedJob::new(builder).map_err(|e| {
            tracing::info!(kind = %kind, project_id = %project.project_id, error = %e, "Job rejected");
            SubmissionError::from(e)
        })?;

        let job_name = if spec.job_name.trim().is_empty() {
            kind.as_str().to_string()
        } else {
            spec.job_name
        };
        let build = job.build_command(&spec.output_directory, &job_name)?;

        tracing::debug!(
            kind = %kind,
            project_id = %project.project_id,
            output = %build.relative_output_path,
            argv = ?build.argv,
            "Submitting job",
        );

        let request = SubmissionRequest {
            build,
            project: project.clone(),
            user: user.clone(),
        };
        let cluster_job_id = self.submitter.submit(&request).await.map_err(|e| {
            tracing::error!(kind = %kind, project_id = %project.project_id, error = %e, "Cluster submission failed");
            e
        })?;

        tracing::info!(
            kind = %kind,
            project_id = %project.project_id,
            cluster_job_id = %cluster_job_id,
            user = %user.username,
            "Job submitted",
        );

        Ok(SubmissionResult {
            cluster_job_id,
            build: request.build,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use serde_json::json;

    use cryoflow_core::builders::{
        Capabilities, JobCommandBuilder, JobKind, ValidationResult,
    };

    use super::*;

    /// Records every request and answers with a fixed id.
    #[derive(Default)]
    struct RecordingSubmitter {
        requests: Mutex<Vec<SubmissionRequest>>,
    }

    #[async_trait]
    impl ClusterSubmitter for RecordingSubmitter {
        async fn submit(&self, request: &SubmissionRequest) -> Result<String, SubmitterError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok("4242".to_string())
        }
    }

    struct FailingSubmitter;

    #[async_trait]
    impl ClusterSubmitter for FailingSubmitter {
        async fn submit(&self, _request: &SubmissionRequest) -> Result<String, SubmitterError> {
            Err(SubmitterError::Rejected {
                exit_code: 1,
                stderr: "invalid partition".into(),
            })
        }
    }

    /// A builder whose validity is fixed and which counts renders.
    struct CountingBuilder {
        ctx: BuilderContext,
        valid: bool,
        renders: Arc<AtomicUsize>,
    }

    impl JobCommandBuilder for CountingBuilder {
        fn kind(&self) -> JobKind {
            JobKind::JoinStar
        }
        fn context(&self) -> &BuilderContext {
            &self.ctx
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities::default()
        }
        fn validate(&self) -> ValidationResult {
            if self.valid {
                ValidationResult::Valid
            } else {
                ValidationResult::invalid("always invalid")
            }
        }
        fn program(&self) -> &'static str {
            "true"
        }
        fn arguments(&self, _output_dir: &str) -> Vec<String> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }
    }

    fn counting_registry(valid: bool, renders: Arc<AtomicUsize>) -> BuilderRegistry {
        let mut registry = BuilderRegistry::empty();
        registry.register(JobKind::JoinStar, move |ctx| {
            Box::new(CountingBuilder {
                ctx,
                valid,
                renders: renders.clone(),
            })
        });
        registry
    }

    fn project() -> ProjectContext {
        ProjectContext::new("P1", "/data/p1")
    }

    fn user() -> ActingUser {
        ActingUser::new("u1", "alice")
    }

    fn spec(kind: &str, parameters: serde_json::Value) -> JobSpec {
        JobSpec {
            kind: kind.to_string(),
            parameters: ParamBag::from_value(parameters),
            output_directory: "/data/p1/JoinStar/job004/".to_string(),
            job_name: "join".to_string(),
        }
    }

    #[tokio::test]
    async fn invalid_spec_is_never_built_or_submitted() {
        let renders = Arc::new(AtomicUsize::new(0));
        let submitter = Arc::new(RecordingSubmitter::default());
        let coordinator =
            SubmissionCoordinator::new(counting_registry(false, renders.clone()), submitter.clone());

        let result = coordinator.submit(spec("JoinStar", json!({})), &project(), &user()).await;

        assert_matches!(result, Err(SubmissionError::Validation(m)) if m == "always invalid");
        assert_eq!(renders.load(Ordering::SeqCst), 0);
        assert!(submitter.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn valid_spec_is_built_once_and_submitted() {
        let renders = Arc::new(AtomicUsize::new(0));
        let submitter = Arc::new(RecordingSubmitter::default());
        let coordinator =
            SubmissionCoordinator::new(counting_registry(true, renders.clone()), submitter.clone());

        let result = coordinator
            .submit(spec("JoinStar", json!({})), &project(), &user())
            .await
            .expect("submits");

        assert_eq!(result.cluster_job_id, "4242");
        assert_eq!(renders.load(Ordering::SeqCst), 1);
        let requests = submitter.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].build.relative_output_path, "JoinStar/job004");
        assert_eq!(requests[0].user.username, "alice");
    }

    #[tokio::test]
    async fn unknown_kind_is_reported() {
        let coordinator = SubmissionCoordinator::new(
            BuilderRegistry::default(),
            Arc::new(RecordingSubmitter::default()),
        );
        let result = coordinator.submit(spec("Autopick", json!({})), &project(), &user()).await;
        assert_matches!(result, Err(SubmissionError::UnknownJobKind(k)) if k == "Autopick");
    }

    #[tokio::test]
    async fn output_outside_project_is_a_build_error() {
        let renders = Arc::new(AtomicUsize::new(0));
        let submitter = Arc::new(RecordingSubmitter::default());
        let coordinator =
            SubmissionCoordinator::new(counting_registry(true, renders), submitter.clone());

        let mut job = spec("JoinStar", json!({}));
        job.output_directory = "/scratch/elsewhere".to_string();

        let result = coordinator.submit(job, &project(), &user()).await;
        assert_matches!(
            result,
            Err(SubmissionError::Build(CoreError::OutputOutsideProject { .. }))
        );
        assert!(submitter.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submitter_error_is_surfaced_unchanged() {
        let coordinator = SubmissionCoordinator::new(
            counting_registry(true, Arc::new(AtomicUsize::new(0))),
            Arc::new(FailingSubmitter),
        );
        let result = coordinator.submit(spec("JoinStar", json!({})), &project(), &user()).await;
        assert_matches!(
            result,
            Err(SubmissionError::Submitter(SubmitterError::Rejected { exit_code: 1, .. }))
        );
    }

    #[tokio::test]
    async fn blank_job_name_defaults_to_kind() {
        let submitter = Arc::new(RecordingSubmitter::default());
        let coordinator = SubmissionCoordinator::new(
            counting_registry(true, Arc::new(AtomicUsize::new(0))),
            submitter.clone(),
        );
        let mut job = spec("JoinStar", json!({}));
        job.job_name = "  ".to_string();

        let result = coordinator.submit(job, &project(), &user()).await.expect("submits");
        assert_eq!(result.build.job_name, "JoinStar");
    }
}
