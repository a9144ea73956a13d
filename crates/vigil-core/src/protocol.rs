//! Control-message schema spoken over the text channel.
//!
//! Inbound:
//! - alert payload `{"level": int, "message": string, "elapsed_time": number}`
//!   (no type tag — the `level` field identifies it)
//! - reset confirmation `{"type": "reset_ok"}`
//! - anything else that parses as JSON is an informational event
//!
//! Outbound:
//! - `start_stream` plain-text command after connect
//! - acknowledgement `{"type": "reset_confirm"}`

use serde::{Deserialize, Serialize};

use crate::types::{AlertRecord, Severity};

/// Plain-text command that asks the server to start relaying frames.
pub const START_STREAM: &str = "start_stream";

const RESET_CONFIRM: &str = "reset_confirm";
const RESET_OK: &str = "reset_ok";

// MARK: - Wire payloads

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct AlertPayload {
    level: i64,
    message: String,
    #[serde(default)]
    elapsed_time: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct TypedPayload {
    #[serde(rename = "type")]
    msg_type: String,
}

// MARK: - Classification

/// A classified inbound text message.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Server-reported alert condition.
    Alert(AlertRecord),
    /// Server confirmed the acknowledged alert was reset.
    ResetOk,
    /// Well-formed text with no recognized schema; logged and ignored.
    Other(String),
}

/// Classify one inbound text payload.
///
/// Returns `Err` only for structurally malformed text; the caller discards
/// it with a local diagnostic — a bad message never ends the stream.
pub fn parse_control(text: &str) -> Result<ControlMessage, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    if value.get("level").is_some() {
        let payload: AlertPayload = serde_json::from_value(value)?;
        return Ok(ControlMessage::Alert(AlertRecord {
            severity: Severity::from_level(payload.level),
            message: payload.message,
            elapsed_time: payload.elapsed_time,
        }));
    }

    if let Some(tag) = value.get("type").and_then(|t| t.as_str()) {
        if tag == RESET_OK {
            return Ok(ControlMessage::ResetOk);
        }
    }

    Ok(ControlMessage::Other(text.to_owned()))
}

/// Acknowledgement the client sends after the user clears a critical alert.
pub fn reset_confirm() -> String {
    let payload = TypedPayload { msg_type: RESET_CONFIRM.to_owned() };
    // A two-field struct with owned strings cannot fail to serialize.
    serde_json::to_string(&payload).unwrap_or_else(|_| format!(r#"{{"type":"{RESET_CONFIRM}"}}"#))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_the_alert_schema() {
        let msg = parse_control(r#"{"level":2,"message":"drowsy","elapsed_time":3.5}"#)
            .expect("valid alert");
        match msg {
            ControlMessage::Alert(record) => {
                assert_eq!(record.severity, Severity::Critical);
                assert_eq!(record.message, "drowsy");
                assert!((record.elapsed_time - 3.5).abs() < f64::EPSILON);
            }
            other => panic!("expected alert, got {other:?}"),
        }
    }

    #[test]
    fn elapsed_time_is_optional() {
        let msg = parse_control(r#"{"level":1,"message":"eyes off road"}"#).expect("valid alert");
        match msg {
            ControlMessage::Alert(record) => {
                assert_eq!(record.severity, Severity::Warning);
                assert_eq!(record.elapsed_time, 0.0);
            }
            other => panic!("expected alert, got {other:?}"),
        }
    }

    #[test]
    fn classifies_the_reset_confirmation() {
        let msg = parse_control(r#"{"type":"reset_ok"}"#).expect("valid confirmation");
        assert_eq!(msg, ControlMessage::ResetOk);
    }

    #[test]
    fn unrecognized_json_is_informational() {
        let msg = parse_control(r#"{"type":"status","fps":29}"#).expect("well-formed");
        assert!(matches!(msg, ControlMessage::Other(_)));
    }

    #[test]
    fn truncated_json_is_malformed() {
        assert!(parse_control(r#"{"level":"#).is_err());
    }

    #[test]
    fn alert_with_missing_message_is_malformed() {
        assert!(parse_control(r#"{"level":2}"#).is_err());
    }

    #[test]
    fn reset_confirm_matches_the_wire_format() {
        assert_eq!(reset_confirm(), r#"{"type":"reset_confirm"}"#);
    }
}
