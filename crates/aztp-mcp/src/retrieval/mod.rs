//! Knowledge-base retrieval: provider abstraction and the degrade-on-failure
//! retrieval pipeline.

pub mod normalize;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::error::ProviderError;

pub use normalize::{normalize, Normalized, CHUNK_ID_KEY, MAX_SOURCES};

/// Default number of results requested from the provider.
pub const DEFAULT_RESULT_COUNT: u32 = 3;

/// One raw item returned by a knowledge-base provider.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RetrievalResult {
    pub text: Option<String>,
    pub source_uri: Option<String>,
    pub score: Option<f64>,
    pub metadata: Map<String, Value>,
}

/// Citation-ready reference derived from a raw result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagSource {
    pub id: String,
    pub file_name: String,
    pub snippet: String,
    pub score: f64,
}

/// Parameters of one provider retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalQuery {
    pub knowledge_base_id: String,
    pub text: String,
    pub number_of_results: u32,
}

/// Result of [`retrieve_context`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalOutcome {
    pub context: String,
    pub is_rag_working: bool,
    pub rag_sources: Vec<RagSource>,
}

impl RetrievalOutcome {
    /// Retrieval did not produce usable grounding.
    pub fn unavailable() -> Self {
        Self::default()
    }
}

/// A retrieval provider.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<RetrievalResult>, ProviderError>;
}

/// Query a knowledge base and normalize the results.
///
/// Never fails: a missing knowledge-base id skips the provider call, and a
/// provider error or an empty result both yield an unavailable outcome.
pub async fn retrieve_context<K>(
    kb: &K,
    query: &str,
    knowledge_base_id: &str,
    number_of_results: u32,
) -> RetrievalOutcome
where
    K: KnowledgeBase + ?Sized,
{
    if knowledge_base_id.is_empty() {
        warn!("knowledgeBaseId is not provided");
        return RetrievalOutcome::unavailable();
    }

    let request = RetrievalQuery {
        knowledge_base_id: knowledge_base_id.to_string(),
        text: query.to_string(),
        number_of_results,
    };

    let results = match kb.retrieve(&request).await {
        Ok(results) => results,
        Err(e) => {
            error!("RAG error: {e}");
            return RetrievalOutcome::unavailable();
        }
    };

    let normalized = normalize(&results);
    debug!(
        raw = results.len(),
        usable = normalized.usable,
        "normalized retrieval results"
    );
    if normalized.usable == 0 {
        return RetrievalOutcome::unavailable();
    }

    RetrievalOutcome {
        context: normalized.context,
        is_rag_working: true,
        rag_sources: normalized.sources,
    }
}
