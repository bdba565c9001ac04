//! Index manifest and change detection.
//!
//! The manifest is the persisted record of what is currently indexed: a map
//! from document id to its content hash and the chunk ids written for it.
//! It is loaded at the start of a sync, diffed against the freshly
//! normalized documents, and rewritten atomically (write a sibling temp
//! file, then rename) only after every vector-store operation has
//! succeeded. A crash mid-write leaves the previous manifest intact, and a
//! failed sync leaves it untouched so the next run retries the same diff.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::Document;

/// Persisted state for one indexed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub content_hash: String,
    /// Chunk ids written for this document, kept so removals and shrinking
    /// re-chunks can delete exactly the stale vectors.
    pub chunk_ids: Vec<String>,
}

/// Mapping from document id to what the vector store currently holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexManifest {
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl IndexManifest {
    /// Load the manifest from disk.
    ///
    /// A missing file means nothing is indexed yet. A file that fails to
    /// parse is treated the same way — the sync falls back to a full
    /// reindex rather than failing.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "manifest unreadable, falling back to full reindex");
                Self::default()
            }
        }
    }

    /// Atomically replace the manifest on disk.
    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "manifest.json".to_string());
        let tmp = path.with_file_name(format!("{}.tmp", file_name));

        let body = serde_json::to_vec_pretty(self)?;
        fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }
}

/// Partition of document ids produced by change detection.
///
/// The four sets are disjoint and their union is exactly the union of the
/// manifest's ids and the fresh document ids. Each set is sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Compare freshly normalized documents against the previous manifest.
///
/// Pure: never touches the vector store. A document id present on both
/// sides with a differing hash is `changed` — including the case where a
/// row was deleted and a new row inherited its derived id in the same
/// cycle, which must not pass through a removed/added window with stale
/// vectors. With `force`, every fresh document is treated as changed.
pub fn diff_documents(docs: &[Document], manifest: &IndexManifest, force: bool) -> ChangeSet {
    let mut diff = ChangeSet::default();

    for doc in docs {
        match manifest.entries.get(&doc.id) {
            None => diff.added.push(doc.id.clone()),
            Some(entry) if force || entry.content_hash != doc.content_hash => {
                diff.changed.push(doc.id.clone())
            }
            Some(_) => diff.unchanged.push(doc.id.clone()),
        }
    }

    for id in manifest.entries.keys() {
        if !docs.iter().any(|doc| &doc.id == id) {
            diff.removed.push(id.clone());
        }
    }

    diff.added.sort();
    diff.changed.sort();
    diff.removed.sort();
    diff.unchanged.sort();
    diff
}
