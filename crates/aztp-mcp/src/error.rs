//! Error types for the AZTP MCP core.
//!
//! Only configuration and handshake errors may end the process. Provider
//! failures during a tool call are converted into an error envelope at the
//! dispatch boundary and never reach these top-level types.

use crate::lifecycle::Phase;

/// Missing or unusable startup configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Failure reported by an outbound provider call (identity, knowledge base,
/// image generation, payments).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error(transparent)]
    InvalidPath(#[from] SegmentError),

    #[error("{0}")]
    Other(String),
}

/// A caller-supplied id that cannot stand as one URL path segment.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{name} must be a non-empty id other than '.' or '..', got {value:?}")]
pub struct SegmentError {
    pub name: &'static str,
    pub value: String,
}

/// Fatal identity handshake outcome.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("identity name must not be empty")]
    MissingName,

    #[error("identity provider call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Invalid identity: provider did not verify '{id}'")]
    Unverified { id: String },

    #[error("identity already established")]
    AlreadyEstablished,
}

/// Tool table construction errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("tool name must not be empty")]
    EmptyName,
}

/// Illegal server lifecycle transition.
#[derive(Debug, thiserror::Error)]
#[error("illegal lifecycle transition: {from:?} -> {to:?}")]
pub struct LifecycleError {
    pub from: Phase,
    pub to: Phase,
}

/// Top-level error returned when a running server stops abnormally.
///
/// Configuration and tool-table errors surface before serving starts and are
/// reported by the binaries directly.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}
