//! Startup configuration shared by every server.
//!
//! Values come from CLI flags or the matching environment variables. An
//! empty value counts as absent.

use clap::Args;
use secrecy::SecretString;

use crate::error::{ConfigError, HandshakeError};
use crate::identity::{parse_link_to, IdentityHandshake, IdentityMetadata};

/// AZTP options, flattened into each server's command line.
#[derive(Debug, Clone, Default, Args)]
pub struct IdentityArgs {
    /// AZTP API key.
    #[arg(long, env = "AZTP_API_KEY", hide_env_values = true)]
    pub aztp_api_key: Option<String>,

    /// Name under which this server's identity is issued.
    #[arg(long, env = "AZTP_IDENTITY_NAME")]
    pub aztp_identity_name: Option<String>,

    /// Trust domain for the issued identity.
    #[arg(long, env = "AZTP_TRUST_DOMAIN")]
    pub aztp_trust_domain: Option<String>,

    /// Identity to link to; a single reference or a JSON array string.
    #[arg(long, env = "AZTP_LINK_TO")]
    pub aztp_link_to: Option<String>,

    /// Parent identity reference.
    #[arg(long, env = "AZTP_PARENT_IDENTITY")]
    pub aztp_parent_identity: Option<String>,

    /// Override the AZTP API endpoint.
    #[arg(long, env = "AZTP_BASE_URL")]
    pub aztp_base_url: Option<String>,
}

/// Validated identity configuration.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub api_key: SecretString,
    pub identity_name: String,
    pub trust_domain: Option<String>,
    pub link_to: Vec<String>,
    pub parent_identity: Option<String>,
    pub base_url: Option<String>,
}

impl IdentityConfig {
    pub fn from_args(args: IdentityArgs) -> Result<Self, ConfigError> {
        let api_key = require_secret("AZTP_API_KEY", args.aztp_api_key)?;
        let identity_name = require("AZTP_IDENTITY_NAME", args.aztp_identity_name)?;
        Ok(Self {
            api_key,
            identity_name,
            trust_domain: optional(args.aztp_trust_domain),
            link_to: parse_link_to(args.aztp_link_to.as_deref()),
            parent_identity: optional(args.aztp_parent_identity),
            base_url: optional(args.aztp_base_url),
        })
    }

    pub fn metadata(&self) -> IdentityMetadata {
        IdentityMetadata::build(
            self.trust_domain.as_deref(),
            &self.link_to,
            self.parent_identity.as_deref(),
        )
    }

    pub fn handshake(&self) -> Result<IdentityHandshake, HandshakeError> {
        IdentityHandshake::new(self.identity_name.clone(), self.metadata())
    }
}

/// Presence-check a required value.
pub fn require(name: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    optional(value).ok_or(ConfigError::Missing(name))
}

/// Presence-check a required credential.
pub fn require_secret(name: &'static str, value: Option<String>) -> Result<SecretString, ConfigError> {
    require(name, value).map(SecretString::from)
}

/// Treat empty and whitespace-only values as absent.
pub fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
