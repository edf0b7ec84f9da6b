//! MCP request router.
//!
//! Maps JSON-RPC methods onto the dispatcher. Tool outcomes, including
//! failures, are always JSON-RPC results carrying an envelope; protocol
//! errors (bad method, bad params) use JSON-RPC error objects.

use serde_json::{json, Value};
use tracing::debug;

use crate::dispatch::{Dispatcher, FailureKind, ToolCallRequest, ToolSet};
use crate::identity::ServerHandle;
use crate::jsonrpc::{
    is_notification, method, ok_result, rpc_error, tool_result, INTERNAL_ERROR, INVALID_PARAMS,
    INVALID_REQUEST, METHOD_NOT_FOUND,
};

/// MCP protocol version supported.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP error code for an unknown resource URI.
pub const RESOURCE_NOT_FOUND: i64 = -32002;

pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// Name and version reported in `initialize` and to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}

pub struct McpServer<T: ToolSet> {
    info: ServerInfo,
    dispatcher: Dispatcher<T>,
}

impl<T: ToolSet> McpServer<T> {
    pub fn new(info: ServerInfo, dispatcher: Dispatcher<T>) -> Self {
        Self { info, dispatcher }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    /// Route a JSON-RPC request. Returns `None` for notifications.
    pub async fn handle_request(&self, request: Value) -> Option<Value> {
        if is_notification(&request) {
            debug!(method = ?method(&request), "notification, no response");
            return None;
        }

        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let Some(method) = method(&request) else {
            return Some(rpc_error(id, INVALID_REQUEST, "missing method"));
        };
        let params = request
            .get("params")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));

        Some(match method {
            "initialize" => self.handle_initialize(id),
            "ping" => ok_result(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            METHOD_TOOLS_CALL => self.handle_tools_call(id, params).await,
            "resources/list" => self.handle_resources_list(id),
            "resources/read" => self.handle_resources_read(id, &params).await,
            _ => rpc_error(id, METHOD_NOT_FOUND, format!("method not found: {method}")),
        })
    }

    // ── initialize ────────────────────────────────────────────────────────────

    fn handle_initialize(&self, id: Value) -> Value {
        let mut capabilities = json!({ "tools": {} });
        if !self.dispatcher.tool_set().resources().is_empty() {
            capabilities["resources"] = json!({});
        }
        ok_result(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": capabilities,
                "serverInfo": {
                    "name": self.info.name,
                    "version": self.info.version
                }
            }),
        )
    }

    // ── tools ─────────────────────────────────────────────────────────────────

    fn handle_tools_list(&self, id: Value) -> Value {
        ok_result(id, json!({ "tools": self.dispatcher.list_tools() }))
    }

    async fn handle_tools_call(&self, id: Value, params: Value) -> Value {
        if params.get("name").and_then(Value::as_str).is_none() {
            return rpc_error(id, INVALID_PARAMS, "missing tool name");
        }
        let request: ToolCallRequest = match serde_json::from_value(params) {
            Ok(r) => r,
            Err(e) => return rpc_error(id, INVALID_PARAMS, format!("invalid params: {e}")),
        };
        let envelope = self.dispatcher.call_tool(request).await;
        tool_result(id, &envelope)
    }

    // ── resources ─────────────────────────────────────────────────────────────

    fn handle_resources_list(&self, id: Value) -> Value {
        ok_result(
            id,
            json!({ "resources": self.dispatcher.tool_set().resources() }),
        )
    }

    async fn handle_resources_read(&self, id: Value, params: &Value) -> Value {
        let Some(uri) = params.get("uri").and_then(Value::as_str) else {
            return rpc_error(id, INVALID_PARAMS, "missing resource uri");
        };
        match self.dispatcher.tool_set().read_resource(uri).await {
            Ok(contents) => ok_result(id, json!({ "contents": contents })),
            Err(failure) if failure.kind == FailureKind::NotFound => {
                rpc_error(id, RESOURCE_NOT_FOUND, failure.message)
            }
            Err(failure) => rpc_error(id, INTERNAL_ERROR, failure.message),
        }
    }
}

/// Whether a request is a `tools/call` that expects a reply.
pub fn is_tool_call(request: &Value) -> bool {
    method(request) == Some(METHOD_TOOLS_CALL) && !is_notification(request)
}
