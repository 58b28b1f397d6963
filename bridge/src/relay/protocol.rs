//! Wire frames for the cloud control channel
//!
//! Everything on the WebSocket is a JSON text frame tagged by `type`. Inbound
//! frames the bridge does not recognize are ignored, never errors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound frame from the cloud
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// A unit of work to run against the local agent
    ToolRequest {
        #[serde(default)]
        request_id: String,
        #[serde(default)]
        tool_name: String,
        #[serde(default)]
        arguments: Map<String, Value>,
    },
    /// Application-level keepalive
    Ping,
    /// Any other frame kind
    #[serde(other)]
    Unknown,
}

/// Outbound frame to the cloud
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// Sent once per successful connect
    Status {
        openclaw_status: HealthStatus,
        client_version: String,
    },
    /// Reply to an inbound `ping`
    Pong,
    /// Correlated reply to a `tool_request`. `result` and `error` serialize as
    /// explicit nulls when absent.
    ToolResponse {
        request_id: String,
        success: bool,
        result: Option<String>,
        error: Option<String>,
    },
}

impl Outbound {
    pub fn tool_success(request_id: String, result: String) -> Self {
        Outbound::ToolResponse {
            request_id,
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn tool_failure(request_id: String, error: String) -> Self {
        Outbound::ToolResponse {
            request_id,
            success: false,
            result: None,
            error: Some(error),
        }
    }
}

/// Reachability of the local agent, as reported in the `status` frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unreachable,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unreachable => write!(f, "unreachable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_tool_request() {
        let raw = r#"{
            "type": "tool_request",
            "request_id": "abc123",
            "tool_name": "local_openclaw",
            "arguments": {"query": "hi"}
        }"#;
        match serde_json::from_str::<Inbound>(raw).unwrap() {
            Inbound::ToolRequest {
                request_id,
                tool_name,
                arguments,
            } => {
                assert_eq!(request_id, "abc123");
                assert_eq!(tool_name, "local_openclaw");
                assert_eq!(arguments.get("query").and_then(Value::as_str), Some("hi"));
            }
            other => panic!("wrong frame: {:?}", other),
        }
    }

    #[test]
    fn tool_request_fields_default_when_missing() {
        let raw = r#"{"type": "tool_request"}"#;
        match serde_json::from_str::<Inbound>(raw).unwrap() {
            Inbound::ToolRequest {
                request_id,
                tool_name,
                arguments,
            } => {
                assert!(request_id.is_empty());
                assert!(tool_name.is_empty());
                assert!(arguments.is_empty());
            }
            other => panic!("wrong frame: {:?}", other),
        }
    }

    #[test]
    fn parses_ping() {
        assert!(matches!(
            serde_json::from_str::<Inbound>(r#"{"type": "ping"}"#).unwrap(),
            Inbound::Ping
        ));
    }

    #[test]
    fn unknown_frame_kind_is_not_an_error() {
        assert!(matches!(
            serde_json::from_str::<Inbound>(r#"{"type": "surprise", "data": 1}"#).unwrap(),
            Inbound::Unknown
        ));
    }

    #[test]
    fn pong_serializes_with_type_tag_only() {
        let value = serde_json::to_value(Outbound::Pong).unwrap();
        assert_eq!(value, json!({"type": "pong"}));
    }

    #[test]
    fn tool_response_serializes_explicit_nulls() {
        let frame = Outbound::tool_success("abc123".to_string(), "hello".to_string());
        let value = serde_json::to_value(frame).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "tool_response",
                "request_id": "abc123",
                "success": true,
                "result": "hello",
                "error": null
            })
        );
    }

    #[test]
    fn status_serializes_health() {
        let frame = Outbound::Status {
            openclaw_status: HealthStatus::Unreachable,
            client_version: "0.2.1".to_string(),
        };
        let value = serde_json::to_value(frame).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "status",
                "openclaw_status": "unreachable",
                "client_version": "0.2.1"
            })
        );
    }
}
