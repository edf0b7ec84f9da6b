//! Tool definitions for the knowledge-base server.

use async_trait::async_trait;
use aztp_mcp::retrieval::{retrieve_context, DEFAULT_RESULT_COUNT};
use aztp_mcp::{
    ContentBlock, KnowledgeBase, ResponseEnvelope, ToolDescriptor, ToolFailure, ToolResult, ToolSet,
};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{json, Number};

pub const RETRIEVE_TOOL: &str = "retrieve_from_aws_kb";
pub const IDENTITY_TOOL: &str = "get_aws_kb_retrieval_server_aztp_identity";

pub const NO_RESULTS: &str = "Retrieval failed or returned no results.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveArgs {
    pub query: String,
    pub knowledge_base_id: String,
    #[serde(default = "default_result_count", deserialize_with = "result_count")]
    pub n: u32,
}

fn default_result_count() -> u32 {
    DEFAULT_RESULT_COUNT
}

/// Accepts `3` as well as an integral float such as `3.0`.
fn result_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Number::deserialize(deserializer)?;
    let whole = number.as_u64().or_else(|| {
        number
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0)
            .map(|f| f as u64)
    });
    whole
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| de::Error::custom(format!("n must be a non-negative integer, got {number}")))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "name", content = "arguments")]
pub enum KbCall {
    #[serde(rename = "retrieve_from_aws_kb")]
    Retrieve(RetrieveArgs),
}

pub struct KbTools<K> {
    kb: K,
}

impl<K: KnowledgeBase> KbTools<K> {
    pub fn new(kb: K) -> Self {
        Self { kb }
    }

    pub fn knowledge_base(&self) -> &K {
        &self.kb
    }

    async fn retrieve(&self, args: RetrieveArgs) -> ToolResult {
        let outcome = retrieve_context(&self.kb, &args.query, &args.knowledge_base_id, args.n).await;
        if !outcome.is_rag_working {
            return Ok(ResponseEnvelope::text(NO_RESULTS));
        }
        let sources = serde_json::to_string(&outcome.rag_sources)
            .map_err(|e| ToolFailure::provider(e.to_string()))?;
        Ok(ResponseEnvelope::blocks(vec![
            ContentBlock::text(format!("Context: {}", outcome.context)),
            ContentBlock::text(format!("RAG Sources: {sources}")),
        ]))
    }
}

#[async_trait]
impl<K: KnowledgeBase> ToolSet for KbTools<K> {
    type Call = KbCall;

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor::new(
            RETRIEVE_TOOL,
            "Performs retrieval from the AWS Knowledge Base using the provided query and Knowledge Base ID.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "The query to perform retrieval on" },
                    "knowledgeBaseId": { "type": "string", "description": "The ID of the AWS Knowledge Base" },
                    "n": { "type": "integer", "default": DEFAULT_RESULT_COUNT, "minimum": 1, "description": "Number of results to retrieve" }
                },
                "required": ["query", "knowledgeBaseId"]
            }),
        )]
    }

    async fn call(&self, call: KbCall) -> ToolResult {
        match call {
            KbCall::Retrieve(args) => self.retrieve(args).await,
        }
    }
}

/// Descriptor of the identity tool. The dummy `random_string` property is
/// kept for clients that cannot send an empty argument object.
pub fn identity_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        IDENTITY_TOOL,
        "Get AZTP identity of the AWS KB retrieval server. This is used to secure the connection between this server and other AZTP servers.",
        json!({
            "type": "object",
            "properties": {
                "random_string": { "type": "string", "description": "Dummy parameter for no-parameter tools" }
            },
            "required": ["random_string"]
        }),
    )
}
