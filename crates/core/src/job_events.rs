//! Job status events and the WebSocket frames that carry them.
//!
//! The scheduler reports status changes as [`JobStatusEvent`]s. The API
//! server relays them to browser-side hubs as `job_update` frames; hubs only
//! ever send `subscribe` frames back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Frame type for a job status change pushed to subscribers.
pub const MSG_TYPE_JOB_UPDATE: &str = "job_update";

/// Frame type a client sends to select the project it wants updates for.
pub const MSG_TYPE_SUBSCRIBE: &str = "subscribe";

/// Path of the notification WebSocket endpoint.
pub const WS_PATH: &str = "/ws";

/// A job changed state.
///
/// `job_id` travels as `id` on the wire. Fields other than the identifiers
/// and status pair are kind-specific and kept verbatim in `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusEvent {
    #[serde(rename = "id", alias = "job_id")]
    pub job_id: String,

    #[serde(default)]
    pub project_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(
        rename = "oldStatus",
        alias = "previous_status",
        alias = "old_status",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub previous_status: Option<String>,

    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl JobStatusEvent {
    pub fn new(job_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            project_id: project_id.into(),
            status: None,
            previous_status: None,
            payload: Map::new(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_previous_status(mut self, status: impl Into<String>) -> Self {
        self.previous_status = Some(status.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Both identifiers must be present before an event may be published.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.job_id.trim().is_empty() {
            return Err(CoreError::Validation("job id is required".into()));
        }
        if self.project_id.trim().is_empty() {
            return Err(CoreError::Validation("project_id is required".into()));
        }
        Ok(())
    }
}

/// Frames a client sends to the notification endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "subscribe")]
    Subscribe { project_id: String },
}

#[derive(Serialize)]
struct JobUpdateFrame<'a> {
    r#type: &'static str,
    #[serde(flatten)]
    event: &'a JobStatusEvent,
}

/// Serialize `event` as a `job_update` frame.
pub fn job_update_frame(event: &JobStatusEvent) -> serde_json::Result<String> {
    serde_json::to_string(&JobUpdateFrame {
        r#type: MSG_TYPE_JOB_UPDATE,
        event,
    })
}

/// Serialize a `subscribe` frame for `project_id`.
pub fn subscribe_frame(project_id: &str) -> serde_json::Result<String> {
    serde_json::to_string(&ClientFrame::Subscribe {
        project_id: project_id.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
