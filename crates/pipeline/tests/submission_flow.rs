//! End-to-end submission through the default registry with a stub cluster.

use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::json;

use cryoflow_core::builders::{BuilderRegistry, PIPELINE_CONTROL_FLAG};
use cryoflow_core::params::ParamBag;
use cryoflow_core::types::{ActingUser, ProjectContext};
use cryoflow_pipeline::{
    ClusterSubmitter, JobSpec, SubmissionCoordinator, SubmissionError, SubmissionRequest,
    SubmitterError,
};

#[derive(Default)]
struct StubCluster {
    seen: Mutex<Vec<SubmissionRequest>>,
}

#[async_trait]
impl ClusterSubmitter for StubCluster {
    async fn submit(&self, request: &SubmissionRequest) -> Result<String, SubmitterError> {
        let mut seen = self.seen.lock().unwrap();
        seen.push(request.clone());
        Ok(format!("{}", 1000 + seen.len()))
    }
}

fn project() -> ProjectContext {
    ProjectContext::new("P1", "/data/projects/apoferritin")
}

fn coordinator() -> (SubmissionCoordinator, Arc<StubCluster>) {
    let cluster = Arc::new(StubCluster::default());
    (
        SubmissionCoordinator::new(BuilderRegistry::default(), cluster.clone()),
        cluster,
    )
}

// ---------------------------------------------------------------------------
// Test: JoinStar particles-only submission renders one combine group
// ---------------------------------------------------------------------------

#[tokio::test]
async fn join_star_particles_only() {
    let (coordinator, cluster) = coordinator();
    let spec = JobSpec {
        kind: "JoinStar".into(),
        parameters: ParamBag::from_value(json!({
            "combineParticles": true,
            "particlesStarFile1": "a.star",
            "particlesStarFile2": "b.star"
        })),
        output_directory: "/data/projects/apoferritin/JoinStar/job004/".into(),
        job_name: "join particles".into(),
    };

    let result = coordinator
        .submit(spec, &project(), &ActingUser::new("u1", "alice"))
        .await
        .expect("submits");

    assert_eq!(result.cluster_job_id, "1001");
    let argv = &result.build.argv;
    assert_eq!(argv[0], "relion_star_handler");
    assert!(argv.contains(&"a.star b.star".to_string()));
    assert!(argv.contains(&"JoinStar/job004/join_particles.star".to_string()));
    assert!(!argv.iter().any(|a| a.contains("join_mics") || a.contains("join_movies")));
    assert_eq!(argv[argv.len() - 2], PIPELINE_CONTROL_FLAG);
    assert_eq!(argv[argv.len() - 1], "JoinStar/job004/");
    assert!(!result.build.supports_gpu);
    assert!(!result.build.supports_mpi);

    assert_eq!(cluster.seen.lock().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: invalid parameters never reach the cluster
// ---------------------------------------------------------------------------

#[tokio::test]
async fn join_star_without_switches_is_rejected() {
    let (coordinator, cluster) = coordinator();
    let spec = JobSpec {
        kind: "join_star".into(),
        parameters: ParamBag::from_value(json!({
            "combineParticles": false,
            "combineMicrographs": false,
            "combineMovies": false
        })),
        output_directory: "JoinStar/job005".into(),
        job_name: String::new(),
    };

    let result = coordinator
        .submit(spec, &project(), &ActingUser::default())
        .await;

    assert_matches!(result, Err(SubmissionError::Validation(m)) if !m.is_empty());
    assert!(cluster.seen.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Test: capability flags travel with the command
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refine3d_declares_gpu_and_mpi() {
    let (coordinator, cluster) = coordinator();
    let spec = JobSpec {
        kind: "Refine3D".into(),
        parameters: ParamBag::from_value(json!({
            "inputParticles": "Select/job010/particles.star",
            "referenceMap": "InitialModel/job011/initial_model.mrc",
            "symmetry": "O",
            "useGpu": true
        })),
        output_directory: "Refine3D/job012".into(),
        job_name: "refine".into(),
    };

    let result = coordinator
        .submit(spec, &project(), &ActingUser::default())
        .await
        .expect("submits");

    assert!(result.build.supports_gpu);
    assert!(result.build.supports_mpi);
    let seen = cluster.seen.lock().unwrap();
    assert!(seen[0].build.supports_gpu);
    assert_eq!(seen[0].build.relative_output_path, "Refine3D/job012");
}
