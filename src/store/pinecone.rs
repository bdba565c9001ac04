//! Pinecone-backed [`VectorIndex`] implementation.
//!
//! Talks to a Pinecone index host over its REST data-plane API, scoped to a
//! single namespace. Requires the `PINECONE_API_KEY` environment variable.
//!
//! # Retry Strategy
//!
//! Transient failures use exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - other 4xx (client error) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::VectorStoreConfig;
use crate::models::RowMeta;

use super::{ScoredPoint, VectorIndex, VectorRecord};

/// Upsert batches are capped to stay under the API's request-size limit.
const UPSERT_BATCH: usize = 100;

pub struct PineconeIndex {
    client: reqwest::Client,
    host: String,
    namespace: String,
    api_key: String,
    max_retries: u32,
}

impl PineconeIndex {
    /// Create a client for the configured index host and namespace.
    ///
    /// # Errors
    ///
    /// Returns an error when the host is missing/malformed or
    /// `PINECONE_API_KEY` is not set.
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let host = config.host.trim_end_matches('/').to_string();
        if !host.starts_with("http://") && !host.starts_with("https://") {
            bail!("vector_store.host must be an http(s) URL");
        }

        let api_key = std::env::var("PINECONE_API_KEY")
            .map_err(|_| anyhow::anyhow!("PINECONE_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            host,
            namespace: config.namespace.clone(),
            api_key,
            max_retries: config.max_retries,
        })
    }

    /// POST a JSON body to a data-plane path with retry/backoff, returning
    /// the response body.
    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.host, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Api-Key", &self.api_key)
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.json().await.unwrap_or(serde_json::json!({})));
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "vector store error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("vector store error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("vector store request failed after retries")))
    }
}

#[derive(Serialize)]
struct WireVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a RowMeta,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: serde_json::Value,
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        for batch in records.chunks(UPSERT_BATCH) {
            let vectors: Vec<WireVector<'_>> = batch
                .iter()
                .map(|r| WireVector {
                    id: &r.id,
                    values: &r.vector,
                    metadata: &r.metadata,
                })
                .collect();
            let body = serde_json::json!({
                "vectors": vectors,
                "namespace": self.namespace,
            });
            self.post("/vectors/upsert", &body).await?;
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let body = serde_json::json!({
            "ids": ids,
            "namespace": self.namespace,
        });
        self.post("/vectors/delete", &body).await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredPoint>> {
        let body = serde_json::json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "namespace": self.namespace,
        });
        let raw = self.post("/query", &body).await?;
        let parsed: QueryResponse = serde_json::from_value(raw)?;

        Ok(parsed
            .matches
            .into_iter()
            .map(|m| ScoredPoint {
                id: m.id,
                score: m.score,
                metadata: serde_json::from_value(m.metadata).unwrap_or_default(),
            })
            .collect())
    }
}
