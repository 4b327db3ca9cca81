//! Answer-synthesis collaborator contract.
//!
//! The retrieval core supplies ranked context chunks and receives a
//! free-text answer; everything else about the language model (provider
//! selection, prompting internals) stays behind this trait.

use std::fmt::Write as _;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use sibyl_core::config::SynthesisConfig;
use sibyl_core::{Error, Result, ScoredChunk};

/// Contract for the external answer-synthesis collaborator.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    /// Human-readable collaborator name, for logs.
    fn name(&self) -> &'static str;

    /// Produce a free-text answer to `question` grounded in the ranked
    /// `context` chunks.
    ///
    /// # Errors
    /// Returns an error if the collaborator is unreachable or returns a
    /// malformed response.
    async fn synthesize(&self, question: &str, context: &[ScoredChunk]) -> Result<String>;
}

/// Request body for Ollama's generate endpoint.
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

/// Response body from Ollama's generate endpoint.
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Ollama-backed answer synthesizer.
pub struct OllamaSynthesizer {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaSynthesizer {
    /// System prompt keeping answers grounded in the supplied context.
    const SYSTEM_PROMPT: &'static str = "You answer questions using only the provided context \
        passages. If the context does not contain the answer, say so plainly instead of guessing. \
        Keep answers concise and cite no sources beyond the context.";

    /// Create a synthesizer from configuration.
    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.host.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    /// Assemble the generation prompt from the question and ranked
    /// context passages.
    fn build_prompt(question: &str, context: &[ScoredChunk]) -> String {
        let mut prompt = String::from("Context passages:\n");
        for (rank, scored) in context.iter().enumerate() {
            let _ = write!(
                prompt,
                "\n--- [{}] {} ---\n{}\n",
                rank + 1,
                scored.chunk.source,
                scored.chunk.text
            );
        }
        let _ = write!(prompt, "\nQuestion: {question}\nAnswer:");
        prompt
    }
}

#[async_trait]
impl AnswerSynthesizer for OllamaSynthesizer {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    async fn synthesize(&self, question: &str, context: &[ScoredChunk]) -> Result<String> {
        let request = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: Self::build_prompt(question, context),
            system: Some(Self::SYSTEM_PROMPT.to_owned()),
            temperature: Some(self.temperature),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|error| Error::Synthesis(format!("Ollama request failed: {error}")))?;

        if !response.status().is_success() {
            return Err(Error::Synthesis(format!(
                "Ollama returned error status: {}",
                response.status()
            )));
        }

        let body: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|error| Error::Synthesis(format!("failed to parse Ollama response: {error}")))?;

        Ok(body.response)
    }
}
