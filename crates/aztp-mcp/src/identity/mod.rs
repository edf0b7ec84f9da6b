//! Server identity: metadata construction, the secure-connect handshake, the
//! AZTP provider client and the write-once identity slot.

pub mod client;
pub mod handshake;
pub mod metadata;
pub mod slot;

pub use client::AztpClient;
pub use handshake::{
    IdentityHandshake, IdentityProvider, SecureConnectRequest, SecuredIdentity, ServerHandle,
};
pub use metadata::{parse_link_to, IdentityMetadata};
pub use slot::IdentitySlot;
