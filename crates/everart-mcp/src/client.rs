//! EverArt REST client and generation polling.

use std::time::Duration;

use async_trait::async_trait;
use aztp_mcp::path::resource_segment;
use aztp_mcp::{ProviderError, SegmentError};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.everart.ai/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Generation lifecycle as reported by EverArt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl GenerationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Generation {
    pub id: String,
    pub status: GenerationStatus,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Body of a create-generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    #[serde(skip)]
    pub model: String,
    pub prompt: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub image_count: u32,
    pub height: u32,
    pub width: u32,
}

impl GenerationRequest {
    /// Square text-to-image request.
    pub fn txt2img(model: impl Into<String>, prompt: impl Into<String>, image_count: u32) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            kind: "txt2img".into(),
            image_count,
            height: 1024,
            width: 1024,
        }
    }
}

/// Polling schedule for [`fetch_with_polling`].
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(300),
        }
    }
}

/// The EverArt operations the server needs.
#[async_trait]
pub trait EverArtApi: Send + Sync {
    async fn create_generation(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<Generation>, ProviderError>;

    async fn fetch_generation(&self, id: &str) -> Result<Generation, ProviderError>;
}

/// Re-fetch a generation until it reaches a terminal status or `max_wait`
/// elapses.
pub async fn fetch_with_polling<A>(
    api: &A,
    id: &str,
    poll: PollConfig,
) -> Result<Generation, ProviderError>
where
    A: EverArtApi + ?Sized,
{
    let started = Instant::now();
    loop {
        let generation = api.fetch_generation(id).await?;
        if generation.status.is_terminal() {
            return Ok(generation);
        }
        if started.elapsed() >= poll.max_wait {
            return Err(ProviderError::Other(format!(
                "generation {id} did not finish within {}s",
                poll.max_wait.as_secs()
            )));
        }
        debug!(%id, status = ?generation.status, "generation pending");
        tokio::time::sleep(poll.interval).await;
    }
}

pub struct EverArtClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl EverArtClient {
    pub fn new(api_key: SecretString, base_url: Option<&str>) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("everart-mcp/", env!("CARGO_PKG_VERSION")))
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

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request
            .bearer_auth(self.api_key.expose_secret())
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
        serde_json::from_value(body).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[derive(Deserialize)]
struct CreateReply {
    generations: Vec<Generation>,
}

#[derive(Deserialize)]
struct FetchReply {
    generation: Generation,
}

#[async_trait]
impl EverArtApi for EverArtClient {
    async fn create_generation(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<Generation>, ProviderError> {
        let url = generations_url(&self.base_url, &request.model)?;
        debug!(%url, "creating generation");
        let reply: CreateReply = self.send(self.http.post(&url).json(request)).await?;
        Ok(reply.generations)
    }

    async fn fetch_generation(&self, id: &str) -> Result<Generation, ProviderError> {
        let url = generation_url(&self.base_url, id)?;
        let reply: FetchReply = self.send(self.http.get(&url)).await?;
        Ok(reply.generation)
    }
}

fn generations_url(base_url: &str, model: &str) -> Result<String, SegmentError> {
    let model = resource_segment("model", model)?;
    Ok(format!("{base_url}/models/{model}/generations"))
}

fn generation_url(base_url: &str, id: &str) -> Result<String, SegmentError> {
    let id = resource_segment("generation id", id)?;
    Ok(format!("{base_url}/generations/{id}"))
}
