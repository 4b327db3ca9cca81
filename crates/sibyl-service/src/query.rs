//! Retrieval and question answering.
//!
//! `retrieve` performs the vector search; `answer` additionally delegates
//! to the answer-synthesis collaborator with the retrieved context. "Not
//! ready" (no index yet) propagates as a typed error so the transport can
//! answer service-unavailable instead of treating it as internal failure.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::synthesis::AnswerSynthesizer;
use sibyl_core::config::SearchConfig;
use sibyl_core::{Answer, Error, Result, ScoredChunk, SearchMode, SearchRequest};
use sibyl_retrieval::{EmbeddingProvider, IndexManager};

/// Smallest accepted result count.
const MIN_TOP_K: usize = 1;
/// Largest accepted result count.
const MAX_TOP_K: usize = 20;

/// Answer returned when retrieval finds nothing relevant; the synthesis
/// collaborator is not invoked in that case.
const NO_CONTEXT_ANSWER: &str =
    "No relevant context was found for this question. Ingest documents or rephrase the question.";

/// Fallback answer when the collaborator returns empty text.
const EMPTY_SYNTHESIS_ANSWER: &str =
    "The language model did not produce an answer for this question.";

/// Query operations over a shared index manager.
pub struct QueryService<E: EmbeddingProvider, S: AnswerSynthesizer> {
    manager: Arc<IndexManager>,
    embedder: E,
    synthesizer: S,
    search: SearchConfig,
}

impl<E: EmbeddingProvider, S: AnswerSynthesizer> QueryService<E, S> {
    /// Create a query service.
    pub fn new(
        manager: Arc<IndexManager>,
        embedder: E,
        synthesizer: S,
        search: SearchConfig,
    ) -> Self {
        Self {
            manager,
            embedder,
            synthesizer,
            search,
        }
    }

    /// Retrieve the `top_k` most relevant chunks for a question under the
    /// given search mode.
    ///
    /// `top_k` is clamped to 1..=20 (the transport validates; this is a
    /// backstop). May return fewer results than requested, including
    /// zero when the score threshold filters everything; callers treat
    /// that as "no relevant context found", not an error.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for an empty question,
    /// `IndexUnavailable` before any index exists, and `Embedding` if the
    /// query cannot be embedded.
    pub async fn retrieve(
        &self,
        question: &str,
        mode: SearchMode,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if question.trim().is_empty() {
            return Err(Error::InvalidArgument("question must not be empty".to_owned()));
        }

        let clamped = top_k.clamp(MIN_TOP_K, MAX_TOP_K);
        if clamped != top_k {
            debug!(requested = top_k, used = clamped, "clamped top_k into range");
        }

        info!(mode = %mode, top_k = clamped, "processing query");

        let query_vector = self.embedder.embed_query(question).await?;
        let snapshot = self.manager.get_snapshot().await?;

        let request = SearchRequest {
            mode,
            top_k: clamped,
            score_threshold: self.search.score_threshold,
            mmr_lambda: self.search.mmr_lambda,
            mmr_pool_multiplier: self.search.mmr_pool_multiplier,
        };
        let results = snapshot.search(&query_vector, &request)?;

        info!(results = results.len(), "retrieval finished");
        Ok(results)
    }

    /// Answer a question: retrieve context, delegate synthesis, and
    /// report the deduplicated sources in rank order.
    ///
    /// # Errors
    /// Propagates retrieval errors (see [`QueryService::retrieve`]) and
    /// `Synthesis` failures from the collaborator.
    pub async fn answer(
        &self,
        question: &str,
        mode: SearchMode,
        top_k: usize,
    ) -> Result<Answer> {
        let context = self.retrieve(question, mode, top_k).await?;

        if context.is_empty() {
            warn!("no relevant context found; skipping synthesis");
            return Ok(Answer {
                answer: NO_CONTEXT_ANSWER.to_owned(),
                sources: Vec::new(),
            });
        }

        let sources = ranked_sources(&context);
        debug!(
            collaborator = self.synthesizer.name(),
            passages = context.len(),
            "delegating answer synthesis"
        );

        let raw_answer = self.synthesizer.synthesize(question, &context).await?;
        let answer = if raw_answer.trim().is_empty() {
            warn!("synthesis collaborator returned an empty answer");
            EMPTY_SYNTHESIS_ANSWER.to_owned()
        } else {
            raw_answer
        };

        Ok(Answer { answer, sources })
    }
}

/// Deduplicate source identifiers preserving rank order.
fn ranked_sources(context: &[ScoredChunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for scored in context {
        if !sources.contains(&scored.chunk.source) {
            sources.push(scored.chunk.source.clone());
        }
    }
    sources
}
