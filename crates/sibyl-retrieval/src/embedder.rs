//! Embedder adapter over the external embedding capability.
//!
//! The adapter owns the textual framing (passage/query prefix markers),
//! batching, and output validation; the embedding model itself is an
//! opaque external capability reached through Ollama.

use std::future::Future;

use ollama_rs::Ollama;
use ollama_rs::generation::embeddings::request::GenerateEmbeddingsRequest;

use sibyl_core::config::EmbeddingConfig;
use sibyl_core::{Error, Result};

/// Trait for turning text into fixed-length embedding vectors.
///
/// Implementations must be deterministic for identical input and return
/// unit-normalized vectors of a fixed dimensionality. Failures are fatal
/// to the calling operation; retry policy belongs to the caller.
pub trait EmbeddingProvider: Send + Sync {
    /// Ensure the embedding model is reachable and available.
    ///
    /// # Errors
    /// Returns an error if the capability is unreachable or the model is
    /// not present.
    fn ensure_model_available(&self) -> impl Future<Output = Result<()>> + Send;

    /// Embed a batch of corpus passages.
    ///
    /// # Errors
    /// Returns an error if the capability is unreachable or returns output
    /// of unexpected shape; the whole batch fails together.
    fn embed_passages(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send;

    /// Embed a single query.
    ///
    /// Queries and passages may receive different textual framing while
    /// sharing the same underlying capability.
    ///
    /// # Errors
    /// Returns an error if the capability is unreachable or returns output
    /// of unexpected shape.
    fn embed_query(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send;

    /// Dimensionality of the vectors this provider produces.
    fn dimension(&self) -> usize;
}

/// Ollama-backed embedding provider.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    ollama: Ollama,
    model: String,
    dimension: usize,
    passage_prefix: String,
    query_prefix: String,
}

impl OllamaEmbedder {
    /// Create an embedder from configuration.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            ollama: Ollama::new(config.host.clone(), config.port),
            model: config.model.clone(),
            dimension: config.dimension,
            passage_prefix: config.passage_prefix.clone(),
            query_prefix: config.query_prefix.clone(),
        }
    }

    /// Frame raw text with a prefix marker, trimming stray whitespace.
    fn frame(prefix: &str, text: &str) -> String {
        format!("{prefix}{}", text.trim())
    }

    /// Validate and normalize one vector returned by the capability.
    fn check_vector(&self, vector: Vec<f32>) -> Result<Vec<f32>> {
        if vector.len() != self.dimension {
            return Err(Error::Embedding(format!(
                "model '{}' returned a {}-dimensional vector (expected {})",
                self.model,
                vector.len(),
                self.dimension
            )));
        }
        Ok(normalize(vector))
    }

    /// Send one embedding request and validate the response shape.
    async fn request_embeddings(
        &self,
        framed: Vec<String>,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let request = GenerateEmbeddingsRequest::new(self.model.clone(), framed.into());

        let response = self
            .ollama
            .generate_embeddings(request)
            .await
            .map_err(|error| {
                Error::Embedding(format!(
                    "embedding request to model '{}' failed: {error}",
                    self.model
                ))
            })?;

        if response.embeddings.len() != expected {
            return Err(Error::Embedding(format!(
                "model '{}' returned {} embeddings for {} inputs",
                self.model,
                response.embeddings.len(),
                expected
            )));
        }

        response
            .embeddings
            .into_iter()
            .map(|vector| self.check_vector(vector))
            .collect()
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    async fn ensure_model_available(&self) -> Result<()> {
        let models = self.ollama.list_local_models().await.map_err(|error| {
            Error::Embedding(format!(
                "failed to connect to Ollama: {error}. Ensure Ollama is installed and running (ollama serve)"
            ))
        })?;

        let model_available = models.iter().any(|model| model.name.contains(&self.model));
        if !model_available {
            return Err(Error::Embedding(format!(
                "embedding model '{}' not found. Run: ollama pull {}",
                self.model, self.model
            )));
        }

        Ok(())
    }

    async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let framed: Vec<String> = texts
            .iter()
            .map(|text| Self::frame(&self.passage_prefix, text))
            .collect();

        self.request_embeddings(framed, texts.len()).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let framed = vec![Self::frame(&self.query_prefix, text)];

        let mut vectors = self.request_embeddings(framed, 1).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::Embedding("no embedding returned for query".to_owned()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Scale a vector to unit L2 norm. Zero vectors are returned unchanged;
/// they score zero against everything.
pub fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector
        .iter()
        .map(|component| component * component)
        .sum::<f32>()
        .sqrt();
    if norm > 0.0 {
        for component in &mut vector {
            *component /= norm;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash as _, Hasher as _};

    /// Deterministic hash-based embedding provider for tests.
    struct FakeEmbedder {
        dimension: usize,
    }

    impl FakeEmbedder {
        fn embedding(&self, text: &str) -> Vec<f32> {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            let hash = hasher.finish();

            let raw: Vec<f32> = (0..self.dimension)
                .map(|index| ((hash.wrapping_add(index as u64)) % 1000) as f32 / 1000.0)
                .collect();
            normalize(raw)
        }
    }

    impl EmbeddingProvider for FakeEmbedder {
        async fn ensure_model_available(&self) -> Result<()> {
            Ok(())
        }

        async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|text| self.embedding(text)).collect())
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
            Ok(self.embedding(text))
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    fn dot(first: &[f32], second: &[f32]) -> f32 {
        first
            .iter()
            .zip(second.iter())
            .map(|(left, right)| left * right)
            .sum()
    }

    #[test]
    fn test_normalize_produces_unit_norm() {
        let vector = normalize(vec![3.0, 4.0]);
        let norm = dot(&vector, &vector).sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_leaves_zero_vector_alone() {
        let vector = normalize(vec![0.0, 0.0, 0.0]);
        assert_eq!(vector, vec![0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_fake_provider_is_deterministic() {
        let provider = FakeEmbedder { dimension: 64 };

        let first = provider.embed_query("same text").await.expect("embed");
        let second = provider.embed_query("same text").await.expect("embed");

        // Cosine similarity of a vector with itself must be 1.
        assert!((dot(&first, &second) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_fake_provider_batch_shape() {
        let provider = FakeEmbedder { dimension: 32 };
        let texts = vec!["one".to_owned(), "two".to_owned(), "three".to_owned()];

        let vectors = provider.embed_passages(&texts).await.expect("embed batch");

        assert_eq!(vectors.len(), 3);
        for vector in &vectors {
            assert_eq!(vector.len(), 32);
        }
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let provider = FakeEmbedder { dimension: 16 };
        let vectors = provider.embed_passages(&[]).await.expect("embed batch");
        assert!(vectors.is_empty());
    }

    #[test]
    fn test_frame_trims_and_prefixes() {
        let framed = OllamaEmbedder::frame("passage: ", "  some text \n");
        assert_eq!(framed, "passage: some text");
    }
}
