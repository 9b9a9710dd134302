//! JSON-RPC 2.0 protocol types.
//!
//! Newline-delimited JSON over a Unix socket. Build launches additionally
//! push `BuildEventMessage`s to the requesting client before the terminal
//! response.

use bellows_core::ProgressEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request ID (can be string or number)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
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

    /// Serialize to a JSON line ready to be written to the socket.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }
}

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
// Implementation-defined: task resolution or execution failure.
pub const BUILD_FAILED: i32 = -32000;

// ─────────────────────────────────────────────────────────────────────────────
// Build event protocol (async notifications from daemon to client)
// ─────────────────────────────────────────────────────────────────────────────

/// Event pushed to the launching client during a build (no response expected).
///
/// Events are written to the same stream as the launch request, strictly
/// before its terminal response, so clients observe emission order.
#[derive(Debug, Clone, Serialize)]
pub struct BuildEventMessage {
    /// Message type (always "event")
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    /// Event kind: "progress" or "output"
    pub event: &'static str,
    /// Event-specific data
    pub data: Value,
}

impl BuildEventMessage {
    /// Create a progress event message.
    pub fn progress(event: &ProgressEvent) -> Self {
        Self {
            msg_type: "event",
            event: "progress",
            data: serde_json::to_value(event).unwrap_or(Value::Null),
        }
    }

    /// Create an output event for one of the two standard streams.
    pub fn output(stream: OutputStream, content: impl Into<String>) -> Self {
        Self {
            msg_type: "event",
            event: "output",
            data: serde_json::json!({
                "stream": stream.as_str(),
                "content": content.into(),
            }),
        }
    }

    /// Serialize to JSON string with newline
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }
}

/// Which standard stream an output event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}
