//! JSON-RPC 2.0 protocol types
//!
//! Newline-delimited JSON over the daemon socket. Responses answer requests;
//! events are pushed unsolicited as `{"type":"event",...}` lines.

use crate::monitor::MonitorEvent;
use emblem_core::PathStatus;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON-RPC 2.0 request ID (can be string or number)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(RequestId::Number(id)),
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    pub fn success(id: Option<RequestId>, result: impl Into<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result.into()),
            error: None,
        }
    }

    pub fn error(id: Option<RequestId>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Method names
pub const HAS_WATCH: &str = "HasWatch";
pub const ADD_WATCH: &str = "AddWatch";
pub const STATUS: &str = "Status";
pub const CHECK_STATUS: &str = "CheckStatus";
pub const STATS: &str = "Stats";
pub const EXIT: &str = "Exit";

// Event names
pub const WATCH_ADDED: &str = "WatchAdded";
pub const STATUS_CHANGED: &str = "StatusChanged";
pub const STATUS_CHECKED: &str = "StatusChecked";

/// `{path: {text_status, prop_status}}` mapping used on the wire.
pub fn statuses_to_value(statuses: &[PathStatus]) -> Value {
    let map: Map<String, Value> = statuses
        .iter()
        .map(|s| {
            (
                s.path.to_string_lossy().into_owned(),
                json!({
                    "text_status": s.text_status,
                    "prop_status": s.prop_status,
                }),
            )
        })
        .collect();
    Value::Object(map)
}

// ─────────────────────────────────────────────────────────────────────────────
// Daemon Event Protocol (async notifications from daemon to client)
// ─────────────────────────────────────────────────────────────────────────────

/// Event sent from daemon to client (async, no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    /// Message type (always "event")
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Event name (e.g., "StatusChanged")
    pub event: String,
    /// Event-specific data
    pub data: Value,
}

impl EventMessage {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            msg_type: "event".to_string(),
            event: event.into(),
            data,
        }
    }

    /// Serialize to JSON string with newline
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }
}

impl From<&MonitorEvent> for EventMessage {
    fn from(event: &MonitorEvent) -> Self {
        match event {
            MonitorEvent::WatchAdded { path } => {
                Self::new(WATCH_ADDED, json!({ "path": path }))
            }
            MonitorEvent::StatusChanged { path, status } => Self::new(
                STATUS_CHANGED,
                json!({ "path": path, "status": status }),
            ),
            MonitorEvent::StatusChecked {
                path,
                statuses,
                summary,
            } => {
                let mut data = json!({
                    "path": path,
                    "statuses": statuses_to_value(statuses),
                });
                if let Some(summary) = summary {
                    data["summary"] = json!(summary);
                }
                Self::new(STATUS_CHECKED, data)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emblem_core::StatusKind;
    use std::path::PathBuf;

    #[test]
    fn test_request_id_accepts_numbers_and_strings() {
        let req: Request =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"abc","method":"Stats"}"#).unwrap();
        assert_eq!(req.id, Some(RequestId::String("abc".to_string())));
        assert!(req.params.is_null());

        let req: Request =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":7,"method":"Exit","params":{}}"#)
                .unwrap();
        assert_eq!(req.id, Some(RequestId::Number(7)));
    }

    #[test]
    fn test_error_response_omits_result() {
        let json = serde_json::to_string(&Response::error(
            Some(RequestId::Number(1)),
            METHOD_NOT_FOUND,
            "Unknown method: Nope",
        ))
        .unwrap();
        assert!(json.contains("\"code\":-32601"));
        assert!(!json.contains("\"result\""));
    }

    #[test]
    fn test_status_changed_event_line() {
        let event = MonitorEvent::StatusChanged {
            path: PathBuf::from("/wc/file.txt"),
            status: StatusKind::Modified,
        };
        let line = EventMessage::from(&event).to_json_line().unwrap();
        assert!(line.ends_with('\n'));

        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["event"], STATUS_CHANGED);
        assert_eq!(value["data"]["path"], "/wc/file.txt");
        assert_eq!(value["data"]["status"], "modified");
    }

    #[test]
    fn test_statuses_are_keyed_by_path() {
        let value = statuses_to_value(&[
            PathStatus::new("/wc", StatusKind::Normal, StatusKind::None),
            PathStatus::client_error("/wc/broken"),
        ]);
        assert_eq!(value["/wc"]["text_status"], "normal");
        assert_eq!(value["/wc/broken"]["prop_status"], "client_error");
    }
}
