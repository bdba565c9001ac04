//! Query-time retrieval.
//!
//! Embeds a free-text question, runs a similarity query against the vector
//! store, and returns the matches that clear the score threshold in a
//! deterministic order: descending score, ties broken by ascending chunk
//! id. An empty result is a valid "no knowledge available" outcome, not an
//! error.

use std::sync::Arc;

use anyhow::Result;

use crate::models::RetrievalMatch;
use crate::store::VectorIndex;
use crate::traits::Embedder;

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<RetrievalMatch>> {
        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let query_vec = vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("empty embedding response for query"))?;

        let points = self.index.query(&query_vec, top_k).await?;

        let mut matches: Vec<RetrievalMatch> = points
            .into_iter()
            .map(|point| RetrievalMatch {
                chunk_id: point.id,
                // Provider-native scores are clamped into [0, 1] before any
                // thresholding or confidence math.
                score: point.score.clamp(0.0, 1.0),
                metadata: point.metadata,
            })
            .filter(|m| m.score >= min_score)
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });

        Ok(matches)
    }
}
