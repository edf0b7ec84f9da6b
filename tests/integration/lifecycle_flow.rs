//! Integration test: a full stdio session against a server whose identity
//! handshake is still in flight.
//!
//! The client side talks over an in-memory duplex pipe:
//! 1. `initialize` and `tools/list` are answered while the identity is pending
//! 2. a `tools/call` sent during that window is held back
//! 3. the provider releases the handshake and the held call is answered
//! 4. the identity tool then reports the issued id

use std::sync::Arc;

use async_trait::async_trait;
use aztp_mcp::{
    Dispatcher, IdentityHandshake, IdentityMetadata, IdentityProvider, IdentitySlot, McpServer,
    Phase, ProviderError, ResponseEnvelope, SecureConnectRequest, SecuredIdentity, ServeError,
    ServerInfo, ServerLifecycle, StdioTransport, ToolDescriptor, ToolResult, ToolSet,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::sync::{Mutex, Notify};

const ISSUED_ID: &str = "aztp://example.org/workload/echo-server/node/1";

#[derive(Deserialize)]
struct EchoArgs {
    message: String,
}

#[derive(Deserialize)]
#[serde(tag = "name", content = "arguments")]
enum EchoCall {
    #[serde(rename = "echo")]
    Echo(EchoArgs),
}

struct EchoTools;

#[async_trait]
impl ToolSet for EchoTools {
    type Call = EchoCall;

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor::new(
            "echo",
            "Echo a message",
            json!({"type": "object", "properties": {"message": {"type": "string"}}, "required": ["message"]}),
        )]
    }

    async fn call(&self, call: EchoCall) -> ToolResult {
        match call {
            EchoCall::Echo(args) => Ok(ResponseEnvelope::text(args.message)),
        }
    }
}

/// Identity provider that answers only after `release` is notified.
struct GatedProvider {
    release: Arc<Notify>,
    verified: bool,
    seen: Mutex<Vec<Value>>,
}

impl GatedProvider {
    fn new(verified: bool) -> Self {
        Self {
            release: Arc::new(Notify::new()),
            verified,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl IdentityProvider for GatedProvider {
    async fn secure_connect(
        &self,
        request: &SecureConnectRequest,
    ) -> Result<SecuredIdentity, ProviderError> {
        self.seen
            .lock()
            .await
            .push(serde_json::to_value(request).expect("request serializes"));
        self.release.notified().await;
        Ok(SecuredIdentity {
            verified: self.verified,
            id: ISSUED_ID.to_string(),
        })
    }
}

fn echo_lifecycle() -> ServerLifecycle<EchoTools> {
    let dispatcher = Dispatcher::new(
        EchoTools,
        ToolDescriptor::new(
            "get_echo_aztp_identity",
            "Get AZTP identity of the echo server",
            json!({"type": "object", "properties": {}}),
        ),
        IdentitySlot::new(),
    )
    .expect("tool table is valid");
    ServerLifecycle::new(McpServer::new(ServerInfo::new("echo-server", "1.0.0"), dispatcher))
}

fn handshake() -> IdentityHandshake {
    let metadata = IdentityMetadata::build(Some("example.org"), &[], None);
    IdentityHandshake::new("echo-server", metadata).expect("name is non-empty")
}

async fn next_reply<R: AsyncBufRead + Unpin>(replies: &mut Lines<R>) -> Value {
    let line = replies
        .next_line()
        .await
        .expect("read reply")
        .expect("reply before EOF");
    serde_json::from_str(&line).expect("reply is JSON")
}

fn frame(value: Value) -> Vec<u8> {
    let mut line = serde_json::to_vec(&value).expect("frame serializes");
    line.push(b'\n');
    line
}

#[tokio::test]
async fn deferred_call_is_answered_after_identity_is_secured() {
    let mut lifecycle = echo_lifecycle();
    let provider = GatedProvider::new(true);
    let release = provider.release.clone();
    let handshake = handshake();

    let (client, server_io) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);
    let mut transport = StdioTransport::new(BufReader::new(server_read), server_write);

    let (client_read, mut client_write) = tokio::io::split(client);
    let mut replies = BufReader::new(client_read).lines();

    let client_side = async {
        // ── Step 1: tool call while identity is pending ─────────────────
        client_write
            .write_all(&frame(json!({
                "jsonrpc": "2.0", "id": 1, "method": "tools/call",
                "params": {"name": "echo", "arguments": {"message": "hello"}}
            })))
            .await
            .expect("write");

        // ── Step 2: protocol requests are still answered ────────────────
        client_write
            .write_all(&frame(json!({"jsonrpc": "2.0", "id": 2, "method": "initialize", "params": {}})))
            .await
            .expect("write");
        let init = next_reply(&mut replies).await;
        assert_eq!(init["id"], 2, "initialize must not wait for the held call");
        assert_eq!(init["result"]["serverInfo"]["name"], "echo-server");

        client_write
            .write_all(&frame(json!({"jsonrpc": "2.0", "id": 3, "method": "tools/list"})))
            .await
            .expect("write");
        let list = next_reply(&mut replies).await;
        let names: Vec<&str> = list["result"]["tools"]
            .as_array()
            .expect("tools array")
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert_eq!(names, vec!["echo", "get_echo_aztp_identity"]);

        // ── Step 3: release the handshake, held call is answered ────────
        release.notify_one();
        let held = next_reply(&mut replies).await;
        assert_eq!(held["id"], 1);
        assert_eq!(held["result"]["content"][0]["text"], "hello");
        assert!(held["result"].get("isError").is_none());

        // ── Step 4: identity tool reports the issued id ─────────────────
        client_write
            .write_all(&frame(json!({
                "jsonrpc": "2.0", "id": 4, "method": "tools/call",
                "params": {"name": "get_echo_aztp_identity"}
            })))
            .await
            .expect("write");
        let identity = next_reply(&mut replies).await;
        assert_eq!(identity["id"], 4);
        assert_eq!(identity["result"]["content"][0]["text"], ISSUED_ID);

        client_write.shutdown().await.expect("close input");
    };

    let (outcome, ()) = tokio::join!(
        lifecycle.run(&mut transport, &handshake, &provider),
        client_side
    );
    outcome.expect("session ends cleanly");
    assert_eq!(lifecycle.phase(), Phase::Ready);
    assert_eq!(
        lifecycle.identity().get().map(|i| i.id.as_str()),
        Some(ISSUED_ID)
    );

    let seen = provider.seen.lock().await;
    assert_eq!(seen.len(), 1, "exactly one secure-connect call");
    assert_eq!(seen[0]["name"], "echo-server");
    assert_eq!(seen[0]["serverHandle"]["version"], "1.0.0");
    assert_eq!(
        seen[0]["metadata"],
        json!({"isGlobalIdentity": false, "trustDomain": "example.org"})
    );
}

#[tokio::test]
async fn unverified_identity_never_answers_held_calls() {
    let mut lifecycle = echo_lifecycle();
    let provider = GatedProvider::new(false);
    provider.release.notify_one();
    let handshake = handshake();

    let input = frame(json!({
        "jsonrpc": "2.0", "id": 1, "method": "tools/call",
        "params": {"name": "echo", "arguments": {"message": "leak?"}}
    }));
    let mut transport = StdioTransport::new(input.as_slice(), Vec::new());

    let err = lifecycle
        .run(&mut transport, &handshake, &provider)
        .await
        .expect_err("unverified identity is fatal");
    assert!(matches!(err, ServeError::Handshake(_)));
    assert!(err.to_string().contains("Invalid identity"));
    assert_eq!(lifecycle.phase(), Phase::Failed);
    assert!(!lifecycle.identity().is_established());

    let written = String::from_utf8_lossy(transport.writer());
    assert!(!written.contains("leak?"), "held call must not be answered");
}

#[tokio::test]
async fn input_closing_early_still_waits_for_handshake() {
    let mut lifecycle = echo_lifecycle();
    let provider = GatedProvider::new(true);
    provider.release.notify_one();
    let handshake = handshake();

    let mut input = frame(json!({
        "jsonrpc": "2.0", "id": 7, "method": "tools/call",
        "params": {"name": "echo", "arguments": {"message": "late"}}
    }));
    input.extend(frame(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})));
    let mut transport = StdioTransport::new(input.as_slice(), Vec::new());

    lifecycle
        .run(&mut transport, &handshake, &provider)
        .await
        .expect("handshake succeeds after EOF");
    assert_eq!(lifecycle.phase(), Phase::Ready);

    let written = String::from_utf8_lossy(transport.writer()).to_string();
    let replies: Vec<Value> = written
        .lines()
        .map(|l| serde_json::from_str(l).expect("reply is JSON"))
        .collect();
    assert_eq!(replies.len(), 1, "notifications get no reply");
    assert_eq!(replies[0]["id"], 7);
    assert_eq!(replies[0]["result"]["content"][0]["text"], "late");
}

#[tokio::test]
async fn malformed_frame_gets_parse_error_and_session_continues() {
    let mut lifecycle = echo_lifecycle();
    let provider = GatedProvider::new(true);
    provider.release.notify_one();
    let handshake = handshake();

    let mut input = b"{not json\n".to_vec();
    input.extend(frame(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})));
    let mut transport = StdioTransport::new(input.as_slice(), Vec::new());

    lifecycle
        .run(&mut transport, &handshake, &provider)
        .await
        .expect("session ends cleanly");

    let written = String::from_utf8_lossy(transport.writer()).to_string();
    let replies: Vec<Value> = written
        .lines()
        .map(|l| serde_json::from_str(l).expect("reply is JSON"))
        .collect();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["id"], Value::Null);
    assert_eq!(replies[0]["error"]["code"], aztp_mcp::jsonrpc::PARSE_ERROR);
    assert_eq!(replies[1]["id"], 1);
    assert_eq!(replies[1]["result"], json!({}));
}
