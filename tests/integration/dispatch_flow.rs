//! Integration test: JSON-RPC routing through `McpServer`.
//!
//! Exercises the request router the way a client sees it: protocol methods,
//! tool calls with good and bad arguments, the identity tool before and after
//! the handshake, and resources.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use aztp_mcp::jsonrpc::{INVALID_PARAMS, METHOD_NOT_FOUND};
use aztp_mcp::server::{PROTOCOL_VERSION, RESOURCE_NOT_FOUND};
use aztp_mcp::{
    ContentBlock, Dispatcher, IdentitySlot, McpServer, ResourceContents, ResourceDescriptor,
    ResponseEnvelope, SecuredIdentity, ServerInfo, ToolDescriptor, ToolFailure, ToolResult,
    ToolSet,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct LookupArgs {
    key: String,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    5
}

#[derive(Deserialize)]
#[serde(tag = "name", content = "arguments")]
enum CatalogCall {
    #[serde(rename = "lookup")]
    Lookup(LookupArgs),
    #[serde(rename = "explode")]
    Explode {},
}

/// Catalog tools with one resource; counts handler invocations.
#[derive(Default)]
struct CatalogTools {
    calls: AtomicUsize,
}

#[async_trait]
impl ToolSet for CatalogTools {
    type Call = CatalogCall;

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "lookup",
                "Look up a catalog key",
                json!({
                    "type": "object",
                    "properties": {"key": {"type": "string"}, "limit": {"type": "integer"}},
                    "required": ["key"]
                }),
            ),
            ToolDescriptor::new("explode", "Always fails", json!({"type": "object"})),
        ]
    }

    async fn call(&self, call: CatalogCall) -> ToolResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match call {
            CatalogCall::Lookup(args) => Ok(ResponseEnvelope::blocks(vec![
                ContentBlock::text(format!("key={}", args.key)),
                ContentBlock::text(format!("limit={}", args.limit)),
            ])),
            CatalogCall::Explode {} => Err(ToolFailure::provider("upstream timed out")),
        }
    }

    fn resources(&self) -> Vec<ResourceDescriptor> {
        vec![ResourceDescriptor {
            uri: "catalog://index".into(),
            mime_type: "application/json".into(),
            name: "Catalog index".into(),
        }]
    }

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, ToolFailure> {
        if uri != "catalog://index" {
            return Err(ToolFailure::not_found("Resource not found"));
        }
        Ok(vec![ResourceContents {
            uri: uri.into(),
            mime_type: "application/json".into(),
            blob: String::new(),
        }])
    }
}

fn server() -> McpServer<CatalogTools> {
    let dispatcher = Dispatcher::new(
        CatalogTools::default(),
        ToolDescriptor::new(
            "get_catalog_aztp_identity",
            "Get AZTP identity of the catalog server",
            json!({"type": "object", "properties": {}}),
        ),
        IdentitySlot::new(),
    )
    .expect("tool table is valid");
    McpServer::new(ServerInfo::new("catalog-server", "0.3.1"), dispatcher)
}

async fn call(server: &McpServer<CatalogTools>, id: u64, name: &str, arguments: Value) -> Value {
    server
        .handle_request(json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments}
        }))
        .await
        .expect("tools/call always gets a reply")
}

fn texts(reply: &Value) -> Vec<&str> {
    reply["result"]["content"]
        .as_array()
        .expect("content array")
        .iter()
        .filter_map(|b| b["text"].as_str())
        .collect()
}

// === Protocol ===

#[tokio::test]
async fn initialize_advertises_tools_and_resources() {
    let server = server();
    let reply = server
        .handle_request(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}))
        .await
        .expect("reply");
    assert_eq!(reply["jsonrpc"], "2.0");
    assert_eq!(reply["result"]["protocolVersion"], PROTOCOL_VERSION);
    assert_eq!(
        reply["result"]["serverInfo"],
        json!({"name": "catalog-server", "version": "0.3.1"})
    );
    assert!(reply["result"]["capabilities"]["tools"].is_object());
    assert!(reply["result"]["capabilities"]["resources"].is_object());
}

#[tokio::test]
async fn tools_list_keeps_declaration_order_with_identity_last() {
    let server = server();
    let reply = server
        .handle_request(json!({"jsonrpc": "2.0", "id": "list", "method": "tools/list"}))
        .await
        .expect("reply");
    assert_eq!(reply["id"], "list");
    let tools = reply["result"]["tools"].as_array().expect("tools array");
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert_eq!(names, vec!["lookup", "explode", "get_catalog_aztp_identity"]);
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["key"]));
}

#[tokio::test]
async fn unknown_method_and_notifications() {
    let server = server();
    let reply = server
        .handle_request(json!({"jsonrpc": "2.0", "id": 9, "method": "prompts/list"}))
        .await
        .expect("reply");
    assert_eq!(reply["error"]["code"], METHOD_NOT_FOUND);

    let none = server
        .handle_request(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await;
    assert!(none.is_none());

    let with_id = server
        .handle_request(json!({"jsonrpc": "2.0", "id": 10, "method": "notifications/initialized"}))
        .await;
    assert!(with_id.is_none());
}

// === Tool calls ===

#[tokio::test]
async fn typed_arguments_with_defaults() {
    let server = server();
    let reply = call(&server, 1, "lookup", json!({"key": "sku-42"})).await;
    assert_eq!(texts(&reply), vec!["key=sku-42", "limit=5"]);
    assert!(reply["result"].get("isError").is_none());
}

#[tokio::test]
async fn invalid_arguments_never_reach_the_handler() {
    let server = server();
    let reply = call(&server, 2, "lookup", json!({"limit": 3})).await;
    assert_eq!(reply["result"]["isError"], true);
    let text = texts(&reply)[0];
    assert!(text.starts_with("Error: invalid arguments for lookup"), "{text}");
    assert_eq!(server.dispatcher().tool_set().calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_tool_is_an_error_envelope_not_an_rpc_error() {
    let server = server();
    let reply = call(&server, 3, "delete_everything", json!({})).await;
    assert!(reply.get("error").is_none());
    assert_eq!(reply["result"]["isError"], true);
    assert_eq!(texts(&reply), vec!["Unknown tool: delete_everything"]);
}

#[tokio::test]
async fn handler_failure_becomes_error_envelope() {
    let server = server();
    let reply = call(&server, 4, "explode", json!({})).await;
    assert_eq!(reply["result"]["isError"], true);
    assert_eq!(texts(&reply), vec!["Error: upstream timed out"]);

    // The next call is unaffected.
    let reply = call(&server, 5, "lookup", json!({"key": "a", "limit": 1})).await;
    assert_eq!(texts(&reply), vec!["key=a", "limit=1"]);
}

#[tokio::test]
async fn missing_tool_name_is_invalid_params() {
    let server = server();
    let reply = server
        .handle_request(json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call", "params": {}}))
        .await
        .expect("reply");
    assert_eq!(reply["error"]["code"], INVALID_PARAMS);
}

// === Identity tool ===

#[tokio::test]
async fn identity_tool_tracks_the_shared_slot() {
    let server = server();
    let before = call(&server, 7, "get_catalog_aztp_identity", json!({})).await;
    assert_eq!(before["result"]["isError"], true);

    server
        .dispatcher()
        .identity()
        .establish(SecuredIdentity {
            verified: true,
            id: "aztp://example.org/workload/catalog".into(),
        })
        .expect("first write");

    let after = call(&server, 8, "get_catalog_aztp_identity", json!({"random_string": "x"})).await;
    assert!(after["result"].get("isError").is_none());
    assert_eq!(texts(&after), vec!["aztp://example.org/workload/catalog"]);
    assert_eq!(server.dispatcher().tool_set().calls.load(Ordering::SeqCst), 0);
}

// === Resources ===

#[tokio::test]
async fn resources_list_and_read() {
    let server = server();
    let list = server
        .handle_request(json!({"jsonrpc": "2.0", "id": 10, "method": "resources/list"}))
        .await
        .expect("reply");
    assert_eq!(list["result"]["resources"][0]["mimeType"], "application/json");

    let read = server
        .handle_request(json!({
            "jsonrpc": "2.0", "id": 11, "method": "resources/read",
            "params": {"uri": "catalog://index"}
        }))
        .await
        .expect("reply");
    assert_eq!(read["result"]["contents"][0]["uri"], "catalog://index");

    let missing = server
        .handle_request(json!({
            "jsonrpc": "2.0", "id": 12, "method": "resources/read",
            "params": {"uri": "catalog://nope"}
        }))
        .await
        .expect("reply");
    assert_eq!(missing["error"]["code"], RESOURCE_NOT_FOUND);
    assert_eq!(missing["error"]["message"], "Resource not found");
}
