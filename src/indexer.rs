//! Sync orchestration.
//!
//! [`Indexer::sync`] runs the full pipeline: fetch rows → normalize → diff
//! against the persisted manifest → chunk and embed `added ∪ changed`
//! documents → upsert/delete against the vector store → atomically persist
//! the new manifest.
//!
//! The manifest is only written after every store operation has succeeded,
//! so a failure anywhere leaves the previous manifest in place and the next
//! sync retries the same diff — re-running after a partial failure is safe
//! and convergent. At most one sync runs at a time; a request arriving
//! while one is in flight is coalesced away and reported as skipped.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::chunk::chunk_document;
use crate::config::{ChunkingConfig, EmbeddingConfig, ManifestConfig};
use crate::manifest::{diff_documents, ChangeSet, IndexManifest, ManifestEntry};
use crate::models::{Chunk, Document, SyncOutcome, SyncReport};
use crate::normalize::normalize_row;
use crate::store::{VectorIndex, VectorRecord};
use crate::traits::{Embedder, SheetReader};

pub struct Indexer {
    sheet: Arc<dyn SheetReader>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    chunking: ChunkingConfig,
    batch_size: usize,
    manifest_path: PathBuf,
    /// Guards the whole normalize → diff → embed → upsert → persist
    /// sequence. Both webhook-triggered and interval-triggered syncs are
    /// plain callers funneling through this lock.
    sync_lock: Mutex<()>,
}

impl Indexer {
    pub fn new(
        sheet: Arc<dyn SheetReader>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        chunking: ChunkingConfig,
        embedding: &EmbeddingConfig,
        manifest: &ManifestConfig,
    ) -> Self {
        Self {
            sheet,
            embedder,
            index,
            chunking,
            batch_size: embedding.batch_size,
            manifest_path: manifest.path.clone(),
            sync_lock: Mutex::new(()),
        }
    }

    /// Run one sync, or skip if another is already in flight.
    ///
    /// With `force`, every document is treated as changed and re-embedded —
    /// the manual recovery path.
    pub async fn sync(&self, force: bool) -> Result<SyncOutcome> {
        let _guard = match self.sync_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                info!("sync already in flight, skipping this trigger");
                return Ok(SyncOutcome::Skipped);
            }
        };

        let report = self.run_sync(force).await?;
        Ok(SyncOutcome::Completed(report))
    }

    /// Compute the diff a sync would apply, without touching the index or
    /// the manifest.
    pub async fn plan(&self, force: bool) -> Result<(ChangeSet, Vec<String>)> {
        let rows = self.sheet.fetch_rows().await?;
        let (docs, errors) = normalize_all(&rows);
        let manifest = IndexManifest::load(&self.manifest_path);
        Ok((diff_documents(&docs, &manifest, force), errors))
    }

    /// Number of documents the persisted manifest currently tracks.
    pub fn indexed_documents(&self) -> usize {
        IndexManifest::load(&self.manifest_path).entries.len()
    }

    async fn run_sync(&self, force: bool) -> Result<SyncReport> {
        let started = Instant::now();

        let rows = self.sheet.fetch_rows().await?;
        let (docs, errors) = normalize_all(&rows);

        let manifest = IndexManifest::load(&self.manifest_path);
        let diff = diff_documents(&docs, &manifest, force);

        info!(
            rows = rows.len(),
            added = diff.added.len(),
            changed = diff.changed.len(),
            removed = diff.removed.len(),
            unchanged = diff.unchanged.len(),
            skipped_rows = errors.len(),
            force,
            "sync diff computed"
        );

        let by_id: HashMap<&str, &Document> =
            docs.iter().map(|doc| (doc.id.as_str(), doc)).collect();

        // Chunk only what actually needs re-embedding.
        let mut pending: Vec<Chunk> = Vec::new();
        for id in diff.added.iter().chain(diff.changed.iter()) {
            let doc = by_id[id.as_str()];
            pending.extend(chunk_document(
                doc,
                self.chunking.max_chars,
                self.chunking.overlap_chars,
            ));
        }

        let records = self.embed_chunks(&pending).await?;

        // Stale vectors: everything the removed documents ever wrote, plus
        // chunk ids a changed document no longer produces.
        let live_ids: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let mut stale: Vec<String> = Vec::new();
        for id in &diff.removed {
            if let Some(entry) = manifest.entries.get(id) {
                stale.extend(entry.chunk_ids.iter().cloned());
            }
        }
        for id in &diff.changed {
            if let Some(entry) = manifest.entries.get(id) {
                stale.extend(
                    entry
                        .chunk_ids
                        .iter()
                        .filter(|chunk_id| !live_ids.contains(chunk_id.as_str()))
                        .cloned(),
                );
            }
        }

        // Upsert before delete: a changed document that kept its chunk ids
        // is overwritten in place, never passing through a missing window.
        if !records.is_empty() {
            self.index.upsert(&records).await?;
        }
        if !stale.is_empty() {
            self.index.delete(&stale).await?;
        }

        // Everything the store now holds, written atomically.
        let mut chunk_ids_by_doc: HashMap<&str, Vec<String>> = HashMap::new();
        for chunk in &pending {
            chunk_ids_by_doc
                .entry(chunk.document_id.as_str())
                .or_default()
                .push(chunk.id.clone());
        }

        let mut next = IndexManifest::default();
        for doc in &docs {
            let entry = match chunk_ids_by_doc.remove(doc.id.as_str()) {
                Some(chunk_ids) => ManifestEntry {
                    content_hash: doc.content_hash.clone(),
                    chunk_ids,
                },
                // Unchanged document: carry the previous entry forward.
                None => match manifest.entries.get(&doc.id) {
                    Some(entry) => entry.clone(),
                    None => continue,
                },
            };
            next.entries.insert(doc.id.clone(), entry);
        }
        next.persist(&self.manifest_path)?;

        let report = SyncReport {
            added: diff.added.len(),
            changed: diff.changed.len(),
            removed: diff.removed.len(),
            unchanged: diff.unchanged.len(),
            errors,
            elapsed_seconds: started.elapsed().as_secs_f64(),
        };

        info!(
            elapsed_seconds = report.elapsed_seconds,
            vectors_upserted = records.len(),
            vectors_deleted = stale.len(),
            "sync complete"
        );

        Ok(report)
    }

    /// Embed pending chunks in batches and pair each with its vector.
    async fn embed_chunks(&self, pending: &[Chunk]) -> Result<Vec<VectorRecord>> {
        let mut records = Vec::with_capacity(pending.len());

        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                bail!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                );
            }
            for (chunk, vector) in batch.iter().zip(vectors) {
                records.push(VectorRecord {
                    id: chunk.id.clone(),
                    vector,
                    metadata: chunk.metadata.clone(),
                });
            }
        }

        Ok(records)
    }
}

/// Normalize every row, isolating per-row failures into the error list.
fn normalize_all(rows: &[crate::models::RawRow]) -> (Vec<Document>, Vec<String>) {
    let mut docs = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();
    for row in rows {
        match normalize_row(row) {
            Ok(doc) => docs.push(doc),
            Err(err) => {
                warn!(row = row.row_number, error = %err, "skipping malformed row");
                errors.push(err.to_string());
            }
        }
    }
    (docs, errors)
}
