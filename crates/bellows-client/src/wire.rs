//! Per-operation wire transport.
//!
//! Every operation dials the daemon socket, writes one JSON-RPC request
//! line and reads until the matching response. Event messages pushed
//! ahead of the response (`"type":"event"`) are handed to the caller's
//! dispatcher as they arrive, which keeps emission order intact and
//! guarantees the terminal response is observed after the last event.

use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Error)]
pub(crate) enum WireError {
    #[error("i/o failure talking to daemon: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("daemon error ({code}): {message}")]
    Rpc { code: i32, message: String },
}

/// One request/response round-trip without event handling.
pub(crate) async fn request(
    socket: &Path,
    method: &str,
    params: Value,
) -> Result<Value, WireError> {
    request_streaming(socket, method, params, |_, _| {}).await
}

/// One request/response round-trip, dispatching pushed events in order.
pub(crate) async fn request_streaming<F>(
    socket: &Path,
    method: &str,
    params: Value,
    mut on_event: F,
) -> Result<Value, WireError>
where
    F: FnMut(&str, &Value),
{
    let stream = UnixStream::connect(socket).await?;
    let (read, mut write) = stream.into_split();

    let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);
    let request = serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    });
    let mut req_line =
        serde_json::to_string(&request).map_err(|e| WireError::Protocol(e.to_string()))?;
    req_line.push('\n');
    write.write_all(req_line.as_bytes()).await?;

    let mut reader = BufReader::new(read);
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Err(WireError::Protocol("connection closed by daemon".to_string()));
        }

        let msg: Value = serde_json::from_str(&line)
            .map_err(|e| WireError::Protocol(format!("invalid message from daemon: {e}")))?;

        if msg.get("type").and_then(|t| t.as_str()) == Some("event") {
            let kind = msg.get("event").and_then(|v| v.as_str()).unwrap_or("");
            let data = msg.get("data").cloned().unwrap_or(Value::Null);
            on_event(kind, &data);
            continue;
        }

        if let Some(error) = msg.get("error") {
            return Err(WireError::Rpc {
                code: error.get("code").and_then(|c| c.as_i64()).unwrap_or(0) as i32,
                message: error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown daemon error")
                    .to_string(),
            });
        }

        return Ok(msg.get("result").cloned().unwrap_or(Value::Null));
    }
}
