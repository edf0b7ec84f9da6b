//! The identity handshake: one secure-connect round trip, gated on the
//! provider's verification flag.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::metadata::IdentityMetadata;
use crate::error::{HandshakeError, ProviderError};

/// Identity issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecuredIdentity {
    pub verified: bool,
    pub id: String,
}

/// Identifies the server instance being secured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerHandle {
    pub name: String,
    pub version: String,
}

/// Outbound secure-connect request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureConnectRequest {
    pub server_handle: ServerHandle,
    pub name: String,
    pub metadata: IdentityMetadata,
}

/// A trust provider able to issue identities.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn secure_connect(
        &self,
        request: &SecureConnectRequest,
    ) -> Result<SecuredIdentity, ProviderError>;
}

/// Name + metadata to present to the identity provider.
#[derive(Debug, Clone)]
pub struct IdentityHandshake {
    name: String,
    metadata: IdentityMetadata,
}

impl IdentityHandshake {
    /// `name` must be non-empty; the server may not serve tools without it.
    pub fn new(name: impl Into<String>, metadata: IdentityMetadata) -> Result<Self, HandshakeError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(HandshakeError::MissingName);
        }
        Ok(Self { name, metadata })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &IdentityMetadata {
        &self.metadata
    }

    /// Perform the secure-connect call.
    ///
    /// Provider failures and unverified identities are both fatal. There is no
    /// retry.
    pub async fn establish<P>(
        &self,
        provider: &P,
        server: &ServerHandle,
    ) -> Result<SecuredIdentity, HandshakeError>
    where
        P: IdentityProvider + ?Sized,
    {
        let request = SecureConnectRequest {
            server_handle: server.clone(),
            name: self.name.clone(),
            metadata: self.metadata.clone(),
        };
        info!(name = %self.name, server = %server.name, "securing server identity");

        let identity = provider.secure_connect(&request).await.map_err(|e| {
            error!("secure-connect failed: {e}");
            HandshakeError::Provider(e)
        })?;

        if !identity.verified {
            error!(id = %identity.id, "identity provider returned an unverified identity");
            return Err(HandshakeError::Unverified { id: identity.id });
        }

        info!(id = %identity.id, "AZTP secured connection established");
        Ok(identity)
    }
}
