//! Write-once holder for the established server identity.

use std::sync::{Arc, OnceLock};

use super::handshake::SecuredIdentity;
use crate::error::HandshakeError;

/// Shared slot that moves from "unestablished" to "established" exactly once.
///
/// Cloning shares the same slot, so the lifecycle writes it and the
/// dispatcher reads it.
#[derive(Debug, Clone, Default)]
pub struct IdentitySlot {
    inner: Arc<OnceLock<SecuredIdentity>>,
}

impl IdentitySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the identity. A second write is rejected.
    pub fn establish(&self, identity: SecuredIdentity) -> Result<(), HandshakeError> {
        self.inner
            .set(identity)
            .map_err(|_| HandshakeError::AlreadyEstablished)
    }

    pub fn get(&self) -> Option<&SecuredIdentity> {
        self.inner.get()
    }

    pub fn is_established(&self) -> bool {
        self.inner.get().is_some()
    }
}
