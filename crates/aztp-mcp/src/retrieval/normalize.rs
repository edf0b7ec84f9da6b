//! Normalization of raw knowledge-base results into citation records and a
//! context string.
//!
//! Two outputs come from the same filtered sequence:
//!
//! - `sources`: at most [`MAX_SOURCES`] entries, provider order, for display.
//! - `context`: the text of *every* filtered item, joined with a blank line,
//!   for the downstream model.

use serde_json::{Map, Value};

use super::{RagSource, RetrievalResult};

/// Cap on citation records per call.
pub const MAX_SOURCES: usize = 3;

/// Metadata key carrying the provider's stable chunk identifier.
pub const CHUNK_ID_KEY: &str = "x-amz-bedrock-kb-chunk-id";

/// Separator between context segments.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Normalized {
    pub context: String,
    pub sources: Vec<RagSource>,
    /// Number of items that survived filtering.
    pub usable: usize,
}

/// Filter, name, cap and join a provider result list.
pub fn normalize(results: &[RetrievalResult]) -> Normalized {
    let usable: Vec<(&RetrievalResult, &str)> = results
        .iter()
        .filter_map(|r| r.text.as_deref().filter(|t| !t.is_empty()).map(|t| (r, t)))
        .collect();

    let sources = usable
        .iter()
        .take(MAX_SOURCES)
        .enumerate()
        .map(|(index, (result, text))| RagSource {
            id: source_id(&result.metadata, index),
            file_name: display_name(result.source_uri.as_deref(), index),
            snippet: (*text).to_string(),
            score: result.score.unwrap_or(0.0),
        })
        .collect();

    let context = usable
        .iter()
        .map(|(_, text)| *text)
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    Normalized {
        context,
        sources,
        usable: usable.len(),
    }
}

/// Last path segment of the locator, made readable.
fn display_name(uri: Option<&str>, index: usize) -> String {
    let raw = uri
        .and_then(|u| u.rsplit('/').next())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Source-{index}"));

    let spaced = raw.replace('_', " ");
    match spaced.strip_suffix(".txt") {
        Some(stem) => stem.to_string(),
        None => spaced,
    }
}

fn source_id(metadata: &Map<String, Value>, index: usize) -> String {
    metadata
        .get(CHUNK_ID_KEY)
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("chunk-{index}"))
}
