//! Core data models used throughout the sync and chat pipelines.
//!
//! These types represent the spreadsheet rows, documents, chunks, and
//! retrieval results that flow from the sheet into the vector index and
//! back out through the chat path.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One raw spreadsheet row as fetched, before normalization.
///
/// Cells are keyed by the lowercased header name from the sheet's first row.
#[derive(Debug, Clone)]
pub struct RawRow {
    /// 1-based sheet row number (row 1 is the header, data starts at 2).
    pub row_number: u32,
    pub cells: HashMap<String, String>,
}

impl RawRow {
    /// Trimmed cell value for a header name, empty string when absent.
    pub fn cell(&self, name: &str) -> &str {
        self.cells.get(name).map(|v| v.trim()).unwrap_or("")
    }
}

/// Display and filter metadata carried from a row onto its chunks and
/// vector records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowMeta {
    #[serde(default)]
    pub row_number: u32,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
}

/// Canonical unit derived from one [`RawRow`].
///
/// `id` is stable across syncs for the same logical row, and
/// `content_hash` changes exactly when `content` changes.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub content_hash: String,
    pub metadata: RowMeta,
}

/// A retrieval unit derived from a [`Document`].
///
/// Chunk ids are `<document_id>:<index>` so the same content always
/// produces the same ids.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub index: usize,
    pub text: String,
    pub metadata: RowMeta,
}

/// A scored match returned from the retriever, normalized to `[0, 1]`.
#[derive(Debug, Clone)]
pub struct RetrievalMatch {
    pub chunk_id: String,
    pub score: f32,
    pub metadata: RowMeta,
}

/// One source row cited in a chat answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub row_number: u32,
    pub question: String,
    pub relevance_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Structured response for one chat query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub confidence: f32,
    pub session_id: String,
    pub timestamp: String,
    pub latency_seconds: f64,
    pub matches_found: usize,
}

/// Summary of one completed sync.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub added: usize,
    pub changed: usize,
    pub removed: usize,
    pub unchanged: usize,
    /// Reasons for rows skipped during normalization.
    pub errors: Vec<String>,
    pub elapsed_seconds: f64,
}

/// Result of requesting a sync: either it ran, or another sync already held
/// the lock and this request was coalesced away.
#[derive(Debug)]
pub enum SyncOutcome {
    Completed(SyncReport),
    Skipped,
}
