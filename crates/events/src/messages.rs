//! Inbound frame parsing for the notification hub.
//!
//! Only `job_update` frames are of interest. Anything else is reported as a
//! [`MalformedMessage`] so the caller can log and drop it.

use serde_json::{Map, Value};

use cryoflow_core::job_events::{JobStatusEvent, MSG_TYPE_JOB_UPDATE};

#[derive(Debug, thiserror::Error)]
pub enum MalformedMessage {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotObject,

    #[error("unexpected frame type {0:?}")]
    UnexpectedType(Option<String>),

    #[error("job update without a job id")]
    MissingJobId,
}

/// Parse a text frame into a [`JobStatusEvent`].
///
/// The `type` discriminator is stripped. Beyond the identifiers the frame
/// shape is not checked: numeric ids are rendered as strings, and a status
/// that is not a string stays in `payload` under its original key. An event
/// without a `project_id` is attributed to `active_project`, the project the
/// connection subscribed to.
pub fn parse_job_update(text: &str, active_project: &str) -> Result<JobStatusEvent, MalformedMessage> {
    let Value::Object(mut map) = serde_json::from_str::<Value>(text)? else {
        return Err(MalformedMessage::NotObject);
    };

    match map.remove("type") {
        Some(Value::String(t)) if t == MSG_TYPE_JOB_UPDATE => {}
        other => {
            return Err(MalformedMessage::UnexpectedType(
                other.and_then(|v| v.as_str().map(str::to_string)),
            ))
        }
    }

    let (job_id, _) = take_string(&mut map, &["id", "job_id"], true);
    let job_id = job_id.ok_or(MalformedMessage::MissingJobId)?;
    let (project_id, _) = take_string(&mut map, &["project_id"], true);
    let (status, odd_status) = take_string(&mut map, &["status"], false);
    let (previous_status, odd_previous) =
        take_string(&mut map, &["oldStatus", "previous_status", "old_status"], false);
    map.extend(odd_status.into_iter().chain(odd_previous));

    Ok(JobStatusEvent {
        job_id,
        project_id: project_id.unwrap_or_else(|| active_project.to_string()),
        status,
        previous_status,
        payload: map,
    })
}

/// Remove every key in `keys` and return the first non-blank string among
/// them, plus the values that were neither strings nor null.
///
/// With `numbers` set, a number counts as a string.
fn take_string(
    map: &mut Map<String, Value>,
    keys: &[&str],
    numbers: bool,
) -> (Option<String>, Vec<(String, Value)>) {
    let mut found = None;
    let mut other = Vec::new();
    for key in keys {
        match map.remove(*key) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => {
                if found.is_none() && !s.trim().is_empty() {
                    found = Some(s);
                }
            }
            Some(Value::Number(n)) if numbers => {
                found.get_or_insert_with(|| n.to_string());
            }
            Some(value) => other.push((key.to_string(), value)),
        }
    }
    (found, other)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn job_update_is_parsed_and_type_removed() {
        let event = parse_job_update(
            r#"{"type":"job_update","id":"J1","project_id":"P1","status":"RUNNING","newStatus":"RUNNING"}"#,
            "P1",
        )
        .expect("parses");
        assert_eq!(event.job_id, "J1");
        assert_eq!(event.status.as_deref(), Some("RUNNING"));
        assert!(!event.payload.contains_key("type"));
        assert_eq!(event.payload["newStatus"], "RUNNING");
    }

    #[test]
    fn missing_project_is_filled_from_connection() {
        let event = parse_job_update(r#"{"type":"job_update","id":17}"#, "P9").expect("parses");
        assert_eq!(event.job_id, "17");
        assert_eq!(event.project_id, "P9");
    }

    #[test]
    fn loosely_typed_fields_do_not_drop_the_update() {
        let event = parse_job_update(
            r#"{"type":"job_update","id":"J1","project_id":42,"status":3,"oldStatus":"QUEUED"}"#,
            "P1",
        )
        .expect("parses");
        assert_eq!(event.project_id, "42");
        assert_eq!(event.status, None);
        assert_eq!(event.payload["status"], 3);
        assert_eq!(event.previous_status.as_deref(), Some("QUEUED"));

        let event = parse_job_update(
            r#"{"type":"job_update","id":"J1","previous_status":{"code":2}}"#,
            "P1",
        )
        .expect("parses");
        assert_eq!(event.previous_status, None);
        assert_eq!(event.payload["previous_status"]["code"], 2);
    }

    #[test]
    fn both_id_keys_keep_the_first() {
        let event = parse_job_update(
            r#"{"type":"job_update","id":"J1","job_id":"J1","project_id":"P1"}"#,
            "P1",
        )
        .expect("parses");
        assert_eq!(event.job_id, "J1");
        assert!(!event.payload.contains_key("job_id"));

        let event = parse_job_update(r#"{"type":"job_update","id":"","job_id":8}"#, "P1")
            .expect("parses");
        assert_eq!(event.job_id, "8");
    }

    #[test]
    fn relayed_update_round_trips_through_the_parser() {
        let sent = JobStatusEvent::new("J3", "P1")
            .with_status("FINISHED")
            .with_previous_status("RUNNING")
            .with_field("progress", 100);
        let text = cryoflow_core::job_events::job_update_frame(&sent).expect("serializable");
        assert_eq!(parse_job_update(&text, "P1").expect("parses"), sent);
    }

    #[test]
    fn other_frames_are_rejected() {
        assert_matches!(parse_job_update("not json", "P1"), Err(MalformedMessage::Json(_)));
        assert_matches!(parse_job_update("[1,2]", "P1"), Err(MalformedMessage::NotObject));
        assert_matches!(
            parse_job_update(r#"{"type":"heartbeat"}"#, "P1"),
            Err(MalformedMessage::UnexpectedType(Some(t))) if t == "heartbeat"
        );
        assert_matches!(
            parse_job_update(r#"{"id":"J1"}"#, "P1"),
            Err(MalformedMessage::UnexpectedType(None))
        );
        assert_matches!(
            parse_job_update(r#"{"type":"job_update","status":"RUNNING"}"#, "P1"),
            Err(MalformedMessage::MissingJobId)
        );
        assert_matches!(
            parse_job_update(r#"{"type":"job_update","id":""}"#, "P1"),
            Err(MalformedMessage::MissingJobId)
        );
    }
}
