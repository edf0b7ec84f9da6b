//! JSON-RPC 2.0 helpers.

use serde_json::{json, Value};

use crate::envelope::ResponseEnvelope;

pub const JSONRPC_VERSION: &str = "2.0";

// JSON-RPC 2.0 error codes
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

pub fn ok_result(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

pub fn rpc_error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {
            "code": code,
            "message": message.into()
        }
    })
}

/// Wrap a tool envelope as a JSON-RPC result.
pub fn tool_result(id: Value, envelope: &ResponseEnvelope) -> Value {
    match serde_json::to_value(envelope) {
        Ok(result) => ok_result(id, result),
        Err(e) => rpc_error(id, INTERNAL_ERROR, format!("failed to encode result: {e}")),
    }
}

pub const NOTIFICATION_PREFIX: &str = "notifications/";

/// Requests without an `id`, and any `notifications/*` method, are
/// notifications and get no reply.
pub fn is_notification(request: &Value) -> bool {
    if method(request).is_some_and(|m| m.starts_with(NOTIFICATION_PREFIX)) {
        return true;
    }
    match request.get("id") {
        None | Some(Value::Null) => true,
        Some(_) => false,
    }
}

pub fn method(request: &Value) -> Option<&str> {
    request.get("method").and_then(Value::as_str)
}
