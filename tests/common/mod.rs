//! Deterministic fakes shared by the pipeline integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use sheetqa::models::RawRow;
use sheetqa::store::memory::InMemoryIndex;
use sheetqa::store::{ScoredPoint, VectorIndex, VectorRecord};
use sheetqa::traits::{Embedder, SheetReader};

/// Build a raw row from `(header, value)` pairs.
pub fn row(row_number: u32, pairs: &[(&str, &str)]) -> RawRow {
    RawRow {
        row_number,
        cells: pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
    }
}

pub fn qa_row(row_number: u32, question: &str, answer: &str) -> RawRow {
    row(row_number, &[("question", question), ("answer", answer)])
}

/// Sheet reader backed by a swappable in-memory row set, with an optional
/// fetch delay for exercising the sync lock.
pub struct StaticSheet {
    rows: Mutex<Vec<RawRow>>,
    pub fetch_delay: Duration,
}

impl StaticSheet {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
            fetch_delay: Duration::ZERO,
        }
    }

    pub fn with_delay(rows: Vec<RawRow>, fetch_delay: Duration) -> Self {
        Self {
            rows: Mutex::new(rows),
            fetch_delay,
        }
    }

    pub fn set_rows(&self, rows: Vec<RawRow>) {
        *self.rows.lock().unwrap() = rows;
    }
}

#[async_trait]
impl SheetReader for StaticSheet {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>> {
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        Ok(self.rows.lock().unwrap().clone())
    }
}

/// Deterministic embedder mapping topic keywords onto fixed axes, so
/// related texts are near-parallel and unrelated texts are orthogonal.
pub struct KeywordEmbedder;

const AXES: [&[&str]; 3] = [
    &["python", "課程"],
    &["refund", "退費"],
    &["deliver", "shipping"],
];

fn keyword_vector(text: &str) -> Vec<f32> {
    let lowered = text.to_lowercase();
    AXES.iter()
        .map(|keywords| {
            keywords
                .iter()
                .map(|k| lowered.matches(k).count())
                .sum::<usize>() as f32
        })
        .collect()
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }

    fn model_name(&self) -> &str {
        "keyword-axes"
    }

    fn dims(&self) -> usize {
        AXES.len()
    }
}

/// Embedder that fails the first `failures` calls, then delegates to
/// [`KeywordEmbedder`]. Exercises retry-by-rerun convergence.
pub struct FlakyEmbedder {
    failures_left: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn new(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            bail!("simulated transient embedding provider failure");
        }
        KeywordEmbedder.embed(texts).await
    }

    fn model_name(&self) -> &str {
        "flaky-keyword-axes"
    }

    fn dims(&self) -> usize {
        AXES.len()
    }
}

/// [`InMemoryIndex`] wrapper that counts store operations, so tests can
/// assert an idempotent sync touches the store zero times.
pub struct CountingIndex {
    pub inner: InMemoryIndex,
    pub upsert_calls: AtomicUsize,
    pub upserted_records: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub deleted_ids: AtomicUsize,
}

impl CountingIndex {
    pub fn new() -> Self {
        Self {
            inner: InMemoryIndex::new(),
            upsert_calls: AtomicUsize::new(0),
            upserted_records: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            deleted_ids: AtomicUsize::new(0),
        }
    }

    pub fn store_ops(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst) + self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for CountingIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.upserted_records
            .fetch_add(records.len(), Ordering::SeqCst);
        self.inner.upsert(records).await
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.deleted_ids.fetch_add(ids.len(), Ordering::SeqCst);
        self.inner.delete(ids).await
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredPoint>> {
        self.inner.query(vector, top_k).await
    }
}
