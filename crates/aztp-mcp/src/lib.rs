//! AZTP MCP: shared core for identity-secured Model Context Protocol servers.
//!
//! Provides the tool registry and dispatcher, the uniform response envelope,
//! the AZTP identity handshake, the retrieval result normalizer, and the
//! stdio server lifecycle used by the knowledge-base, image-generation and
//! payments servers.

pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod jsonrpc;
pub mod lifecycle;
pub mod path;
pub mod registry;
pub mod retrieval;
pub mod server;
pub mod telemetry;
pub mod transport;

// Re-export primary types
pub use config::{IdentityArgs, IdentityConfig};
pub use dispatch::{Dispatcher, FailureKind, ToolCallRequest, ToolFailure, ToolResult, ToolSet};
pub use envelope::{ContentBlock, ResourceContents, ResourceDescriptor, ResponseEnvelope};
pub use error::{
    ConfigError, HandshakeError, LifecycleError, ProviderError, RegistryError, SegmentError,
    ServeError,
};
pub use identity::{
    AztpClient, IdentityHandshake, IdentityMetadata, IdentityProvider, IdentitySlot,
    SecureConnectRequest, SecuredIdentity, ServerHandle,
};
pub use lifecycle::{serve_stdio, Phase, ServerLifecycle};
pub use registry::{ToolDescriptor, ToolRegistry};
pub use retrieval::{KnowledgeBase, RagSource, RetrievalOutcome, RetrievalQuery, RetrievalResult};
pub use server::{McpServer, ServerInfo};
pub use telemetry::LogArgs;
pub use transport::StdioTransport;
