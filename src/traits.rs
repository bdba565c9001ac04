//! Capability interfaces consumed by the core pipeline.
//!
//! The sync and chat paths never talk to a provider SDK directly — they go
//! through these narrow traits so the core stays testable with
//! deterministic fakes, and provider-specific retry/backoff policy stays
//! out of the core's own idempotence guarantees.
//!
//! | Trait | Capability |
//! |-------|-----------|
//! | [`SheetReader`] | Fetch spreadsheet rows as structured records |
//! | [`Embedder`] | Turn a batch of texts into embedding vectors |
//! | [`Generator`] | Turn a grounding prompt into answer text |
//!
//! The vector store capability lives in [`crate::store::VectorIndex`]
//! alongside its implementations.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::RawRow;

/// Read access to the knowledge-base spreadsheet.
#[async_trait]
pub trait SheetReader: Send + Sync {
    /// Fetch all active data rows as an immutable snapshot for one sync
    /// cycle.
    async fn fetch_rows(&self) -> Result<Vec<RawRow>>;
}

/// Text-to-vector embedding capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;
}

/// Prompt-to-text generation capability.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
