//! Vector store abstraction.
//!
//! The [`VectorIndex`] trait defines the three operations the pipeline
//! needs from a vector database — upsert, delete, and similarity query —
//! enabling pluggable backends. The indexer is the only writer; the
//! retriever only queries.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`upsert`](VectorIndex::upsert) | Insert or overwrite vector records |
//! | [`delete`](VectorIndex::delete) | Remove records by id |
//! | [`query`](VectorIndex::query) | Nearest-neighbour search for a query vector |

pub mod memory;
pub mod pinecone;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::RowMeta;

/// What lives in the vector store: one embedded chunk plus its metadata.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Chunk id (`<document_id>:<index>`).
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: RowMeta,
}

/// One scored hit from a similarity query, in the backend's native score
/// range.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub metadata: RowMeta,
}

/// Abstract vector database backend.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert records, overwriting any existing record with the same id.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Delete records by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Return up to `top_k` nearest records for the query vector, most
    /// similar first.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredPoint>>;
}
