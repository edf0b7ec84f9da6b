//! HTTP client for the AZTP identity provider.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use super::handshake::{IdentityProvider, SecureConnectRequest, SecuredIdentity};
use crate::config::IdentityConfig;
use crate::error::ProviderError;

/// Default AZTP API endpoint. Override with `AZTP_BASE_URL`.
pub const DEFAULT_BASE_URL: &str = "https://api.astha.ai/aztp/v1";

/// Header carrying the AZTP API key.
const API_KEY_HEADER: &str = "api_access_key";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Identity provider backed by the AZTP REST API.
pub struct AztpClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl AztpClient {
    pub fn new(api_key: SecretString, base_url: Option<&str>) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("aztp-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &IdentityConfig) -> Result<Self, ProviderError> {
        Self::new(config.api_key.clone(), config.base_url.as_deref())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl IdentityProvider for AztpClient {
    async fn secure_connect(
        &self,
        request: &SecureConnectRequest,
    ) -> Result<SecuredIdentity, ProviderError> {
        let url = format!("{}/secure-connect", self.base_url);
        debug!(%url, "sending secure-connect request");

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response.json().await?;
        parse_identity(body)
    }
}

/// Accepted reply shapes: `{verified, id}` or `{identity: {verify, aztpId}}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SecureConnectReply {
    Flat {
        verified: bool,
        id: String,
    },
    Nested {
        identity: NestedIdentity,
    },
}

#[derive(Deserialize)]
struct NestedIdentity {
    verify: bool,
    #[serde(rename = "aztpId")]
    aztp_id: String,
}

fn parse_identity(body: serde_json::Value) -> Result<SecuredIdentity, ProviderError> {
    let reply: SecureConnectReply = serde_json::from_value(body)
        .map_err(|e| ProviderError::Decode(format!("secure-connect reply: {e}")))?;
    Ok(match reply {
        SecureConnectReply::Flat { verified, id } => SecuredIdentity { verified, id },
        SecureConnectReply::Nested { identity } => SecuredIdentity {
            verified: identity.verify,
            id: identity.aztp_id,
        },
    })
}
