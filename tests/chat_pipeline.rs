//! End-to-end chat path tests over deterministic fakes.
//!
//! Index a small knowledge base through the real sync pipeline, then drive
//! the chat engine against it: grounded answers for on-topic questions,
//! the deterministic fallback for off-topic ones, and degraded responses
//! when the generation capability fails.

mod common;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tempfile::TempDir;

use common::{row, CountingIndex, KeywordEmbedder, StaticSheet};
use sheetqa::chat::ChatEngine;
use sheetqa::config::{
    ChunkingConfig, EmbeddingConfig, GenerationConfig, ManifestConfig, RetrievalConfig,
};
use sheetqa::indexer::Indexer;
use sheetqa::models::RawRow;
use sheetqa::retrieve::Retriever;
use sheetqa::traits::Generator;

/// Generator that echoes the prompt back, so tests can verify grounding.
struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(format!("echo:{}", prompt))
    }
}

/// Generator that always fails, for the degraded path.
struct BrokenGenerator;

#[async_trait]
impl Generator for BrokenGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("simulated generation provider outage")
    }
}

fn knowledge_rows() -> Vec<RawRow> {
    vec![
        row(
            2,
            &[
                ("question", "你們有 Python 課程嗎?"),
                ("answer", "有的，歡迎報名我們的 Python 課程。"),
                ("link", "https://example.com/python"),
            ],
        ),
        row(
            3,
            &[
                ("question", "如何申請退費?"),
                ("answer", "請聯繫客服辦理退費。"),
            ],
        ),
        row(
            4,
            &[
                ("question", "Do you deliver abroad?"),
                ("answer", "Shipping is domestic only."),
            ],
        ),
    ]
}

/// Sync the knowledge rows into an in-memory index and build a chat engine
/// over the same index and embedder.
async fn chat_harness(generator: Arc<dyn Generator>) -> (TempDir, ChatEngine) {
    let tmp = TempDir::new().unwrap();
    let sheet = Arc::new(StaticSheet::new(knowledge_rows()));
    let index = Arc::new(CountingIndex::new());
    let embedder = Arc::new(KeywordEmbedder);
    let manifest = ManifestConfig {
        path: tmp.path().join("manifest.json"),
    };

    let indexer = Indexer::new(
        sheet,
        embedder.clone(),
        index.clone(),
        ChunkingConfig::default(),
        &EmbeddingConfig::default(),
        &manifest,
    );
    indexer.sync(false).await.unwrap();

    let engine = ChatEngine::new(
        Retriever::new(embedder, index),
        generator,
        RetrievalConfig::default(),
        &GenerationConfig::default(),
    );
    (tmp, engine)
}

#[tokio::test]
async fn test_on_topic_query_returns_grounded_answer() {
    let (_tmp, engine) = chat_harness(Arc::new(EchoGenerator)).await;

    let response = engine.chat("Python 課程", None).await;

    assert!(response.matches_found >= 1);
    assert!(response.confidence > 0.0);
    assert_eq!(
        response.sources[0].row_number, 2,
        "the Python course row must rank first"
    );
    assert!(
        response.sources[0].relevance_score > 0.3,
        "top match must clear the configured threshold"
    );
    // The echo generator reflects the grounding prompt, which must carry
    // the retrieved answer text and link.
    assert!(response.answer.contains("歡迎報名"));
    assert!(response.answer.contains("https://example.com/python"));
    assert!(response.answer.contains("Python 課程"));
}

#[tokio::test]
async fn test_off_topic_query_falls_back_with_zero_confidence() {
    let (_tmp, engine) = chat_harness(Arc::new(EchoGenerator)).await;

    let response = engine.chat("what is the weather on mars", None).await;

    assert_eq!(response.matches_found, 0);
    assert_eq!(response.confidence, 0.0);
    assert!(response.sources.is_empty());
    assert_eq!(
        response.answer,
        GenerationConfig::default().fallback_answer,
        "the fallback answer is deterministic"
    );
}

#[tokio::test]
async fn test_generation_failure_degrades_instead_of_erroring() {
    let (_tmp, engine) = chat_harness(Arc::new(BrokenGenerator)).await;

    let response = engine.chat("Python 課程", None).await;

    assert_eq!(response.answer, GenerationConfig::default().fallback_answer);
    assert_eq!(response.confidence, 0.0);
    assert!(
        response.matches_found >= 1,
        "retrieval succeeded even though generation failed"
    );
}

#[tokio::test]
async fn test_sources_are_ordered_by_descending_score() {
    let (_tmp, engine) = chat_harness(Arc::new(EchoGenerator)).await;

    // "退費" hits the refund row hard and nothing else.
    let response = engine.chat("退費", None).await;
    assert!(response.matches_found >= 1);
    for pair in response.sources.windows(2) {
        assert!(pair[0].relevance_score >= pair[1].relevance_score);
    }
    assert_eq!(response.sources[0].row_number, 3);
}

#[tokio::test]
async fn test_session_id_is_kept_or_generated() {
    let (_tmp, engine) = chat_harness(Arc::new(EchoGenerator)).await;

    let kept = engine
        .chat("Python 課程", Some("session-42".to_string()))
        .await;
    assert_eq!(kept.session_id, "session-42");

    let generated = engine.chat("Python 課程", None).await;
    assert!(!generated.session_id.is_empty());
    assert_ne!(generated.session_id, "session-42");
}
