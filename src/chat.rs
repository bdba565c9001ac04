//! Chat engine: retrieval-grounded answer composition.
//!
//! For each visitor question the engine retrieves the best-matching
//! knowledge-base entries, builds a grounding prompt from them, invokes the
//! generation capability, and scores its own confidence from the retrieval
//! scores. Every failure on this path degrades to the configured fallback
//! answer with confidence 0 — a visitor-facing chat always returns
//! something.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};
use uuid::Uuid;

use crate::config::{GenerationConfig, RetrievalConfig};
use crate::models::{ChatResponse, RetrievalMatch, SourceRef};
use crate::retrieve::Retriever;
use crate::traits::Generator;

pub struct ChatEngine {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    retrieval: RetrievalConfig,
    fallback_answer: String,
}

impl ChatEngine {
    pub fn new(
        retriever: Retriever,
        generator: Arc<dyn Generator>,
        retrieval: RetrievalConfig,
        generation: &GenerationConfig,
    ) -> Self {
        Self {
            retriever,
            generator,
            retrieval,
            fallback_answer: generation.fallback_answer.clone(),
        }
    }

    /// Answer one visitor question.
    pub async fn chat(&self, query: &str, session_id: Option<String>) -> ChatResponse {
        let started = Instant::now();
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let matches = match self
            .retriever
            .retrieve(query, self.retrieval.top_k, self.retrieval.min_score)
            .await
        {
            Ok(matches) => matches,
            Err(err) => {
                error!(error = %format!("{:#}", err), "retrieval failed, degrading to fallback");
                return self.respond(session_id, self.fallback_answer.clone(), &[], 0.0, started);
            }
        };

        if matches.is_empty() {
            info!(query = %truncate(query, 50), "no matches above threshold");
            return self.respond(session_id, self.fallback_answer.clone(), &[], 0.0, started);
        }

        let prompt = build_prompt(query, &matches);
        let answer = match self.generator.generate(&prompt).await {
            Ok(answer) => answer,
            Err(err) => {
                error!(error = %format!("{:#}", err), "generation failed, degrading to fallback");
                return self.respond(session_id, self.fallback_answer.clone(), &matches, 0.0, started);
            }
        };

        let confidence = confidence(&matches);
        info!(
            query = %truncate(query, 50),
            matches = matches.len(),
            confidence,
            "chat response generated"
        );
        self.respond(session_id, answer, &matches, confidence, started)
    }

    fn respond(
        &self,
        session_id: String,
        answer: String,
        matches: &[RetrievalMatch],
        confidence: f32,
        started: Instant,
    ) -> ChatResponse {
        ChatResponse {
            answer,
            sources: matches.iter().map(source_ref).collect(),
            confidence,
            session_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            latency_seconds: started.elapsed().as_secs_f64(),
            matches_found: matches.len(),
        }
    }
}

/// Confidence in the composed answer, in `[0, 1]`.
///
/// The mean of the top score and the average score: monotonic in the top
/// match's score, exactly 0 for an empty match set, and approaching 1 only
/// when the best match is near-exact.
pub fn confidence(matches: &[RetrievalMatch]) -> f32 {
    let top = match matches.first() {
        Some(m) => m.score,
        None => return 0.0,
    };
    let mean = matches.iter().map(|m| m.score).sum::<f32>() / matches.len() as f32;
    ((top + mean) / 2.0).clamp(0.0, 1.0)
}

/// Format the retrieved entries into a numbered reference block.
fn build_context_block(matches: &[RetrievalMatch]) -> String {
    let mut blocks = Vec::with_capacity(matches.len());
    for (i, m) in matches.iter().enumerate() {
        let meta = &m.metadata;
        let mut block = format!(
            "[Reference {}] (relevance {:.4})\nQuestion: {}\nAnswer: {}",
            i + 1,
            m.score,
            meta.question,
            meta.answer
        );
        if let Some(link) = &meta.link {
            block.push_str(&format!("\nLink: {}", link));
        }
        if let Some(category) = &meta.category {
            block.push_str(&format!("\nCategory: {}", category));
        }
        blocks.push(block);
    }
    blocks.join("\n\n")
}

fn build_prompt(query: &str, matches: &[RetrievalMatch]) -> String {
    format!(
        "Visitor question: {}\n\n\
         Reference entries retrieved from the knowledge base:\n\n{}\n\n\
         Answer the visitor's question using only the references above.",
        query,
        build_context_block(matches)
    )
}

fn source_ref(m: &RetrievalMatch) -> SourceRef {
    SourceRef {
        row_number: m.metadata.row_number,
        question: m.metadata.question.clone(),
        relevance_score: m.score,
        link: m.metadata.link.clone(),
        category: m.metadata.category.clone(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
