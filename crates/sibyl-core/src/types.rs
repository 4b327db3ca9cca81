//! Core data types for chunks, search requests, and service reports.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// A bounded span of text extracted from a document; the unit of retrieval.
///
/// Immutable once created. `source` traces back to the originating document
/// for citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text, at most the configured chunk size in characters.
    pub text: String,
    /// Identifier of the originating document (path or name).
    pub source: String,
    /// 0-based position of this chunk within its source document.
    pub sequence_no: usize,
}

impl Chunk {
    /// Create a new chunk.
    pub fn new(text: String, source: String, sequence_no: usize) -> Self {
        Self {
            text,
            source,
            sequence_no,
        }
    }
}

/// A chunk paired with its embedding vector.
///
/// The vector is expected to be unit-normalized; similarity search scores
/// with a plain dot product under that assumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    /// The source chunk.
    pub chunk: Chunk,
    /// Embedding vector of the configured dimensionality.
    pub vector: Vec<f32>,
}

/// A retrieved chunk with its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Similarity to the query (cosine, in `[-1, 1]`).
    pub score: f32,
}

/// Nearest-neighbor search mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Top-k by cosine similarity, descending.
    #[default]
    Similarity,
    /// Maximal marginal relevance: balances relevance against diversity
    /// among the selected results.
    Mmr,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Similarity => formatter.write_str("similarity"),
            Self::Mmr => formatter.write_str("mmr"),
        }
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "similarity" => Ok(Self::Similarity),
            "mmr" => Ok(Self::Mmr),
            other => Err(format!(
                "unknown search mode '{other}' (expected 'similarity' or 'mmr')"
            )),
        }
    }
}

/// Parameters for one nearest-neighbor search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Search mode.
    pub mode: SearchMode,
    /// Maximum number of results to return.
    pub top_k: usize,
    /// Minimum similarity a candidate must reach to be returned. Filtering
    /// may legitimately leave fewer than `top_k` results, including zero.
    pub score_threshold: Option<f32>,
    /// MMR relevance/diversity balance (0.0 = pure diversity, 1.0 = pure
    /// relevance). Ignored in similarity mode.
    pub mmr_lambda: f32,
    /// MMR candidate pool size as a multiple of `top_k`. Ignored in
    /// similarity mode.
    pub mmr_pool_multiplier: usize,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            mode: SearchMode::Similarity,
            top_k: 5,
            score_threshold: None,
            mmr_lambda: 0.5,
            mmr_pool_multiplier: 4,
        }
    }
}

impl SearchRequest {
    /// Create a request with the given mode and result count, keeping the
    /// remaining knobs at their defaults.
    pub fn new(mode: SearchMode, top_k: usize) -> Self {
        Self {
            mode,
            top_k,
            ..Self::default()
        }
    }
}

/// Outcome class of an ingest operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    /// The operation completed and the index was published (or was already
    /// up to date).
    Success,
    /// Nothing was indexed, but the condition is expected (e.g. an empty
    /// corpus), not a failure.
    Warning,
    /// The operation failed; nothing was published.
    Error,
}

impl fmt::Display for IngestStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => formatter.write_str("success"),
            Self::Warning => formatter.write_str("warning"),
            Self::Error => formatter.write_str("error"),
        }
    }
}

/// Result of an ingest operation, reported to the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    /// Outcome class.
    pub status: IngestStatus,
    /// Human-readable description of what happened.
    pub message: String,
    /// Number of documents processed.
    #[serde(default)]
    pub documents: usize,
    /// Number of chunks indexed.
    #[serde(default)]
    pub chunks: usize,
}

impl IngestReport {
    /// Build a success report.
    pub fn success(message: impl Into<String>, documents: usize, chunks: usize) -> Self {
        Self {
            status: IngestStatus::Success,
            message: message.into(),
            documents,
            chunks,
        }
    }

    /// Build a warning report (nothing indexed, by expectation).
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: IngestStatus::Warning,
            message: message.into(),
            documents: 0,
            chunks: 0,
        }
    }

    /// Build an error report.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: IngestStatus::Error,
            message: message.into(),
            documents: 0,
            chunks: 0,
        }
    }
}

/// Answer produced for a question, with the sources that grounded it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Free-text answer from the synthesis collaborator.
    pub answer: String,
    /// Source identifiers of the retrieved context, deduplicated in rank
    /// order.
    pub sources: Vec<String>,
}
