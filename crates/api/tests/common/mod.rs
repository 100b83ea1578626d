#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use cryoflow_api::config::ServerConfig;
use cryoflow_api::router::build_app_router;
use cryoflow_api::state::AppState;
use cryoflow_api::ws::WsManager;
use cryoflow_core::builders::BuilderRegistry;
use cryoflow_events::EventBus;
use cryoflow_pipeline::{
    ClusterSubmitter, SubmissionCoordinator, SubmissionRequest, SubmitterError,
};

/// Cluster stand-in that records every request.
#[derive(Default)]
pub struct StubSubmitter {
    requests: Mutex<Vec<SubmissionRequest>>,
    reject: bool,
}

impl StubSubmitter {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reject: true,
            ..Self::default()
        })
    }

    pub fn requests(&self) -> Vec<SubmissionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterSubmitter for StubSubmitter {
    async fn submit(&self, request: &SubmissionRequest) -> Result<String, SubmitterError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.reject {
            return Err(SubmitterError::Rejected {
                exit_code: 1,
                stderr: "sbatch: error: invalid partition specified".into(),
            });
        }
        Ok("4242".into())
    }
}

/// Everything a test needs to drive and inspect the app.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub submitter: Arc<StubSubmitter>,
    /// Projects root; removed when the test ends.
    pub projects: TempDir,
}

/// Build a test `ServerConfig` rooted at `projects_root`.
pub fn test_config(projects_root: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        projects_root: projects_root.to_path_buf(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

/// Build the full application router with the production middleware stack
/// and a stub cluster.
pub fn build_test_app_with(submitter: Arc<StubSubmitter>) -> TestApp {
    let projects = tempfile::tempdir().unwrap();
    let config = test_config(projects.path());

    let state = AppState {
        config: Arc::new(config.clone()),
        coordinator: SubmissionCoordinator::new(
            BuilderRegistry::with_default_kinds(),
            submitter.clone(),
        ),
        ws_manager: Arc::new(WsManager::new()),
        event_bus: Arc::new(EventBus::default()),
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        submitter,
        projects,
    }
}

pub fn build_test_app() -> TestApp {
    build_test_app_with(StubSubmitter::accepting())
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
