//! Generation provider.
//!
//! [`OpenAiGenerator`] turns a grounding prompt into answer text via the
//! OpenAI chat completions API. Requires the `OPENAI_API_KEY` environment
//! variable. A failed call here surfaces as a degraded chat response, never
//! a process fault, so this client fails fast instead of retrying — the
//! visitor is already waiting.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::traits::Generator;

/// Grounding rules sent as the system message on every generation call.
pub const SYSTEM_PROMPT: &str = "\
You are a friendly, professional support assistant answering visitor \
questions about the company's services.

Rules:
1. Answer only from the reference entries provided. Never invent services, \
features, or details the references do not contain.
2. When a reference includes a link, weave it naturally into the answer.
3. When several references are relevant, merge them into one coherent \
answer, listing options where that helps.
4. When the visitor's question is too broad, ask a short clarifying \
question to narrow it down.
5. Keep answers concise and avoid repeating yourself.";

pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("generation provider error {}: {}", status, body_text);
        }

        let parsed: ChatCompletion = response.json().await?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        if answer.is_empty() {
            bail!("generation provider returned an empty completion");
        }

        Ok(answer)
    }
}
