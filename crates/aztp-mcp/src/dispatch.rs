//! Tool dispatch: routing, typed argument decoding, and the single place
//! where handler failures become error envelopes.
//!
//! A server supplies a [`ToolSet`] whose `Call` type is an enum tagged by
//! tool name (`#[serde(tag = "name", content = "arguments")]`). The
//! dispatcher checks the name against the registry, decodes the arguments
//! into that enum, and hands the typed call to the tool set. The identity
//! tool is answered by the dispatcher itself from the [`IdentitySlot`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::envelope::{ResourceContents, ResourceDescriptor, ResponseEnvelope};
use crate::error::{ProviderError, RegistryError};
use crate::identity::IdentitySlot;
use crate::registry::{ToolDescriptor, ToolRegistry};

/// Placeholder returned by the identity tool before the handshake completes.
pub const NOT_ESTABLISHED: &str = "Server identity not yet established";

/// Outcome of one handler invocation.
pub type ToolResult = Result<ResponseEnvelope, ToolFailure>;

/// Category of a per-call failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidArguments,
    Provider,
    NotFound,
}

/// A failure confined to a single tool call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ToolFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ToolFailure {
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::InvalidArguments,
            message: message.into(),
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Provider,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::NotFound,
            message: message.into(),
        }
    }
}

impl From<ProviderError> for ToolFailure {
    fn from(e: ProviderError) -> Self {
        Self::provider(e.to_string())
    }
}

/// Decoded `tools/call` parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.into(),
            arguments,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The provider-backed tools of one server.
#[async_trait]
pub trait ToolSet: Send + Sync {
    /// Typed call, tagged by tool name.
    type Call: DeserializeOwned + Send;

    /// Descriptors in declaration order, excluding the identity tool.
    fn tools(&self) -> Vec<ToolDescriptor>;

    async fn call(&self, call: Self::Call) -> ToolResult;

    fn resources(&self) -> Vec<ResourceDescriptor> {
        Vec::new()
    }

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, ToolFailure> {
        Err(ToolFailure::not_found(format!("Resource not found: {uri}")))
    }
}

/// Routes tool calls for one server.
pub struct Dispatcher<T: ToolSet> {
    registry: ToolRegistry,
    tools: T,
    identity_tool: String,
    identity: IdentitySlot,
}

impl<T: ToolSet> Dispatcher<T> {
    /// Register the tool set's tools followed by the identity tool.
    pub fn new(
        tools: T,
        identity_tool: ToolDescriptor,
        identity: IdentitySlot,
    ) -> Result<Self, RegistryError> {
        let identity_name = identity_tool.name.clone();
        let mut descriptors = tools.tools();
        descriptors.push(identity_tool);
        Ok(Self {
            registry: ToolRegistry::new(descriptors)?,
            tools,
            identity_tool: identity_name,
            identity,
        })
    }

    pub fn list_tools(&self) -> &[ToolDescriptor] {
        self.registry.list()
    }

    pub fn tool_set(&self) -> &T {
        &self.tools
    }

    pub fn identity(&self) -> &IdentitySlot {
        &self.identity
    }

    pub fn identity_tool(&self) -> &str {
        &self.identity_tool
    }

    /// Answer one tool call. Never fails; every outcome is an envelope.
    pub async fn call_tool(&self, request: ToolCallRequest) -> ResponseEnvelope {
        let ToolCallRequest { name, arguments } = request;

        if !self.registry.contains(&name) {
            warn!(tool = %name, "unknown tool");
            return ResponseEnvelope::error(format!("Unknown tool: {name}"));
        }

        if name == self.identity_tool {
            return self.identity_envelope();
        }

        debug!(tool = %name, "dispatching tool call");
        let outcome = match decode_call::<T::Call>(&name, arguments) {
            Ok(call) => self.tools.call(call).await,
            Err(failure) => Err(failure),
        };
        into_envelope(&name, outcome)
    }

    fn identity_envelope(&self) -> ResponseEnvelope {
        match self.identity.get() {
            Some(identity) => ResponseEnvelope::text(identity.id.clone()),
            None => ResponseEnvelope::error(NOT_ESTABLISHED),
        }
    }
}

/// Decode raw arguments into the tool set's tagged call type.
fn decode_call<C: DeserializeOwned>(name: &str, arguments: Map<String, Value>) -> Result<C, ToolFailure> {
    serde_json::from_value(json!({ "name": name, "arguments": Value::Object(arguments) }))
        .map_err(|e| ToolFailure::invalid_arguments(format!("invalid arguments for {name}: {e}")))
}

/// Convert a handler outcome into the wire envelope.
pub fn into_envelope(name: &str, outcome: ToolResult) -> ResponseEnvelope {
    match outcome {
        Ok(envelope) => envelope,
        Err(failure) => {
            warn!(tool = %name, kind = ?failure.kind, "tool call failed: {}", failure.message);
            ResponseEnvelope::error(format!("Error: {}", failure.message))
        }
    }
}
