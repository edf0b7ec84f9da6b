//! Edge case tests: retrieval normalization and the degrade-on-failure
//! retrieval pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use aztp_mcp::retrieval::{normalize, retrieve_context, CHUNK_ID_KEY, MAX_SOURCES};
use aztp_mcp::{KnowledgeBase, ProviderError, RetrievalQuery, RetrievalResult};
use serde_json::{json, Map, Value};

fn result(text: Option<&str>, uri: Option<&str>, score: Option<f64>) -> RetrievalResult {
    RetrievalResult {
        text: text.map(str::to_string),
        source_uri: uri.map(str::to_string),
        score,
        metadata: Map::new(),
    }
}

fn with_chunk(mut r: RetrievalResult, chunk: &str) -> RetrievalResult {
    r.metadata
        .insert(CHUNK_ID_KEY.to_string(), Value::String(chunk.to_string()));
    r
}

// === Filtering ===

#[test]
fn edge_empty_input() {
    let n = normalize(&[]);
    assert!(n.sources.is_empty());
    assert_eq!(n.context, "");
    assert_eq!(n.usable, 0);
}

#[test]
fn edge_items_without_text_are_dropped_everywhere() {
    let n = normalize(&[
        result(None, Some("s3://b/a.txt"), Some(0.9)),
        result(Some(""), Some("s3://b/b.txt"), Some(0.8)),
        result(Some("kept"), Some("s3://b/c.txt"), Some(0.7)),
    ]);
    assert_eq!(n.usable, 1);
    assert_eq!(n.context, "kept");
    assert_eq!(n.sources.len(), 1);
    assert_eq!(n.sources[0].file_name, "c");
    // Fallback names count from the filtered position, not the raw one.
    assert_eq!(n.sources[0].id, "chunk-0");
}

#[test]
fn edge_whitespace_text_is_kept() {
    let n = normalize(&[result(Some("  "), None, None)]);
    assert_eq!(n.usable, 1);
    assert_eq!(n.context, "  ");
}

// === Capping ===

#[test]
fn edge_sources_capped_but_context_has_everything() {
    let raw: Vec<RetrievalResult> = (0..7)
        .map(|i| result(Some(&format!("passage {i}")), None, Some(1.0 - i as f64 / 10.0)))
        .collect();
    let n = normalize(&raw);
    assert_eq!(n.sources.len(), MAX_SOURCES);
    assert_eq!(n.usable, 7);
    assert_eq!(n.context.split("\n\n").count(), 7);
    assert!(n.context.ends_with("passage 6"));
    let order: Vec<&str> = n.sources.iter().map(|s| s.snippet.as_str()).collect();
    assert_eq!(order, vec!["passage 0", "passage 1", "passage 2"]);
}

#[test]
fn edge_five_results_one_without_text() {
    let raw = vec![
        result(Some("one"), None, None),
        result(None, None, None),
        result(Some("two"), None, None),
        result(Some("three"), None, None),
        result(Some("four"), None, None),
    ];
    let n = normalize(&raw);
    assert_eq!(n.sources.len(), 3);
    assert_eq!(n.context, "one\n\ntwo\n\nthree\n\nfour");
}

// === Naming ===

#[test]
fn edge_display_name_variants() {
    let n = normalize(&[
        result(Some("a"), Some("s3://bucket/folder/"), None),
        result(Some("b"), Some("notes_from_meeting.TXT"), None),
        result(Some("c"), Some("https://host/x/report.txt.bak"), None),
    ]);
    let names: Vec<&str> = n.sources.iter().map(|s| s.file_name.as_str()).collect();
    assert_eq!(names, vec!["Source-0", "notes from meeting.TXT", "report.txt.bak"]);
}

#[test]
fn edge_chunk_id_preferred_over_fallback() {
    let n = normalize(&[
        with_chunk(result(Some("a"), None, Some(0.5)), "1%3A0%3Aabc"),
        with_chunk(result(Some("b"), None, None), ""),
    ]);
    assert_eq!(n.sources[0].id, "1%3A0%3Aabc");
    assert_eq!(n.sources[1].id, "chunk-1");
    assert_eq!(n.sources[1].score, 0.0);
}

#[test]
fn edge_non_string_chunk_id_falls_back() {
    let mut r = result(Some("a"), None, None);
    r.metadata.insert(CHUNK_ID_KEY.to_string(), json!(42));
    assert_eq!(normalize(&[r]).sources[0].id, "chunk-0");
}

// === Pipeline ===

struct Kb {
    reply: fn() -> Result<Vec<RetrievalResult>, ProviderError>,
    calls: AtomicUsize,
}

impl Kb {
    fn new(reply: fn() -> Result<Vec<RetrievalResult>, ProviderError>) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl KnowledgeBase for Kb {
    async fn retrieve(&self, _query: &RetrievalQuery) -> Result<Vec<RetrievalResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.reply)()
    }
}

#[tokio::test]
async fn edge_empty_knowledge_base_id_skips_provider() {
    let kb = Kb::new(|| Ok(vec![result(Some("x"), None, None)]));
    let outcome = retrieve_context(&kb, "q", "", 3).await;
    assert!(!outcome.is_rag_working);
    assert_eq!(kb.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn edge_whitespace_knowledge_base_id_reaches_provider() {
    let kb = Kb::new(|| Ok(vec![result(Some("x"), None, None)]));
    let outcome = retrieve_context(&kb, "q", "   ", 3).await;
    assert!(outcome.is_rag_working);
    assert_eq!(kb.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn edge_provider_error_degrades() {
    let kb = Kb::new(|| {
        Err(ProviderError::Status {
            status: 403,
            body: "AccessDeniedException".into(),
        })
    });
    let outcome = retrieve_context(&kb, "q", "KB123", 3).await;
    assert!(!outcome.is_rag_working);
    assert!(outcome.context.is_empty());
    assert!(outcome.rag_sources.is_empty());
    assert_eq!(kb.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn edge_only_textless_results_degrade() {
    let kb = Kb::new(|| Ok(vec![result(None, Some("s3://b/a.txt"), Some(0.9))]));
    let outcome = retrieve_context(&kb, "q", "KB123", 3).await;
    assert!(!outcome.is_rag_working);
}

#[tokio::test]
async fn edge_usable_results_work() {
    let kb = Kb::new(|| Ok(vec![result(Some("grounding"), Some("s3://b/Guide.txt"), Some(0.42))]));
    let outcome = retrieve_context(&kb, "q", "KB123", 3).await;
    assert!(outcome.is_rag_working);
    assert_eq!(outcome.context, "grounding");
    assert_eq!(
        serde_json::to_value(&outcome.rag_sources).expect("serializes"),
        json!([{"id": "chunk-0", "fileName": "Guide", "snippet": "grounding", "score": 0.42}])
    );
}
