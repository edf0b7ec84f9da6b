//! PayPal REST client with a cached OAuth2 client-credentials token.

use std::time::Duration;

use async_trait::async_trait;
use aztp_mcp::ProviderError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tokens are refreshed this long before PayPal says they expire.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayPalEnvironment {
    Sandbox,
    Live,
}

impl PayPalEnvironment {
    /// `live` selects production; anything else is the sandbox.
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("live") => Self::Live,
            _ => Self::Sandbox,
        }
    }

    pub fn base_url(self) -> &'static str {
        match self {
            Self::Sandbox => "https://api-m.sandbox.paypal.com",
            Self::Live => "https://api-m.paypal.com",
        }
    }
}

/// Authenticated JSON call against the PayPal REST API.
#[async_trait]
pub trait PayPalApi: Send + Sync {
    /// Returns the decoded body, or `Value::Null` for an empty reply.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ProviderError>;
}

struct AccessToken {
    value: SecretString,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenReply {
    access_token: String,
    expires_in: u64,
}

pub struct PayPalClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: SecretString,
    token: Mutex<Option<AccessToken>>,
}

impl PayPalClient {
    pub fn new(
        environment: PayPalEnvironment,
        client_id: String,
        client_secret: SecretString,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("paypal-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: environment.base_url().to_string(),
            client_id,
            client_secret,
            token: Mutex::new(None),
        })
    }

    /// Cached bearer token, fetched again when within the refresh margin.
    async fn access_token(&self) -> Result<SecretString, ProviderError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        debug!("requesting PayPal access token");
        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .header(
                AUTHORIZATION,
                basic_credentials(&self.client_id, &self.client_secret),
            )
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;
        let reply: TokenReply = decode(response).await.and_then(|body| {
            serde_json::from_value(body).map_err(|e| ProviderError::Decode(format!("token reply: {e}")))
        })?;

        let value = SecretString::from(reply.access_token);
        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + Duration::from_secs(reply.expires_in),
        });
        Ok(value)
    }
}

#[async_trait]
impl PayPalApi for PayPalClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ProviderError> {
        let token = self.access_token().await?;
        let url = format!("{}{path}", self.base_url);
        debug!(%method, %url, "paypal request");

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(token.expose_secret())
            .header("Prefer", "return=representation");
        if let Some(body) = body {
            request = request.json(&body);
        }
        decode(request.send().await?).await
    }
}

/// `Basic base64(id:secret)` for the token endpoint.
fn basic_credentials(client_id: &str, client_secret: &SecretString) -> String {
    let raw = format!("{client_id}:{}", client_secret.expose_secret());
    format!("Basic {}", STANDARD.encode(raw))
}

async fn decode(response: reqwest::Response) -> Result<Value, ProviderError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body: error_message(&text),
        });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| ProviderError::Decode(e.to_string()))
}

/// Pull `message` (or `error_description`) out of a PayPal error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error_description"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
