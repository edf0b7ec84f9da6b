//! Bedrock Agent Runtime `Retrieve` client.

use std::time::Duration;

use async_trait::async_trait;
use aztp_mcp::path;
use aztp_mcp::{KnowledgeBase, ProviderError, RetrievalQuery, RetrievalResult, SegmentError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::sigv4::{self, Credentials, SignableRequest};

const SERVICE: &str = "bedrock";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct BedrockKnowledgeBase {
    http: reqwest::Client,
    region: String,
    credentials: Credentials,
}

impl BedrockKnowledgeBase {
    pub fn new(region: impl Into<String>, credentials: Credentials) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("aws-kb-retrieval-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            region: region.into(),
            credentials,
        })
    }

    pub fn host(&self) -> String {
        format!("bedrock-agent-runtime.{}.amazonaws.com", self.region)
    }
}

#[async_trait]
impl KnowledgeBase for BedrockKnowledgeBase {
    async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<RetrievalResult>, ProviderError> {
        let host = self.host();
        let path = retrieve_path(&query.knowledge_base_id)?;
        let body = serde_json::to_vec(&RetrieveRequest::from(query))
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let signed = sigv4::sign(
            &self.credentials,
            &self.region,
            SERVICE,
            &SignableRequest {
                method: "POST",
                host: &host,
                path: &path,
                headers: &[("content-type", "application/json")],
                payload: &body,
            },
            Utc::now(),
        )?;

        let url = format!("https://{host}{path}");
        debug!(%url, results = query.number_of_results, "bedrock retrieve");
        let mut request = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .body(body);
        for (name, value) in signed {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let body: Value = response.json().await?;
        parse_retrieve_response(body)
    }
}

/// `/knowledgebases/{id}/retrieve` with the id percent-encoded.
fn retrieve_path(knowledge_base_id: &str) -> Result<String, SegmentError> {
    let id = path::resource_segment("knowledgeBaseId", knowledge_base_id)?;
    Ok(format!("/knowledgebases/{id}/retrieve"))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveRequest<'a> {
    retrieval_query: QueryText<'a>,
    retrieval_configuration: RetrievalConfiguration,
}

#[derive(Serialize)]
struct QueryText<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalConfiguration {
    vector_search_configuration: VectorSearchConfiguration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VectorSearchConfiguration {
    number_of_results: u32,
}

impl<'a> From<&'a RetrievalQuery> for RetrieveRequest<'a> {
    fn from(query: &'a RetrievalQuery) -> Self {
        Self {
            retrieval_query: QueryText { text: &query.text },
            retrieval_configuration: RetrievalConfiguration {
                vector_search_configuration: VectorSearchConfiguration {
                    number_of_results: query.number_of_results,
                },
            },
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    #[serde(default)]
    retrieval_results: Vec<RawResult>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawResult {
    content: Option<RawContent>,
    location: Option<RawLocation>,
    score: Option<f64>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawContent {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLocation {
    s3_location: Option<RawS3Location>,
}

#[derive(Deserialize)]
struct RawS3Location {
    uri: Option<String>,
}

/// Map a `Retrieve` response body onto provider-neutral results.
fn parse_retrieve_response(body: Value) -> Result<Vec<RetrievalResult>, ProviderError> {
    let response: RetrieveResponse = serde_json::from_value(body)
        .map_err(|e| ProviderError::Decode(format!("retrieve response: {e}")))?;
    Ok(response
        .retrieval_results
        .into_iter()
        .map(|raw| RetrievalResult {
            text: raw.content.and_then(|c| c.text),
            source_uri: raw.location.and_then(|l| l.s3_location).and_then(|s| s.uri),
            score: raw.score,
            metadata: raw.metadata,
        })
        .collect())
}
