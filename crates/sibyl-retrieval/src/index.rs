//! In-memory nearest-neighbor index over embedded chunks.
//!
//! The index is a brute-force linear scan: exact, dependency-free, and
//! fast enough at moderate corpus sizes. Vectors are expected to be
//! unit-normalized, so cosine similarity is a plain dot product.

use std::cmp::Ordering;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sibyl_core::{EmbeddedChunk, Error, Result, ScoredChunk, SearchMode, SearchRequest};

/// Distance metric recorded in index metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity over unit-normalized vectors (dot product).
    Cosine,
}

/// Metadata needed to reconstruct and validate a retriever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// On-disk format version; bumped on incompatible layout changes.
    pub format_version: u32,
    /// Dimensionality shared by every vector in the index.
    pub dimension: usize,
    /// Distance metric the index scores with.
    pub metric: DistanceMetric,
    /// Creation time as a unix timestamp (seconds).
    pub created_at_unix: i64,
    /// Number of entries the index holds.
    pub entry_count: u64,
}

/// Immutable in-memory vector index.
///
/// Mutation happens only through [`VectorIndex::build`] (replace
/// wholesale) and [`VectorIndex::add`] (produce an appended copy); a
/// published index is never modified in place, which is what makes
/// snapshots safely shareable across concurrent readers.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    metadata: IndexMetadata,
    entries: Vec<EmbeddedChunk>,
}

impl VectorIndex {
    /// Current on-disk format version.
    pub const FORMAT_VERSION: u32 = 1;

    /// Construct a fresh index from embedded chunks.
    ///
    /// # Errors
    /// Returns `EmptyInput` for zero chunks and `InvalidArgument` if any
    /// vector does not match `dimension`.
    pub fn build(entries: Vec<EmbeddedChunk>, dimension: usize) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::EmptyInput);
        }
        if let Err(message) = validate_entries(&entries, dimension) {
            return Err(Error::InvalidArgument(message));
        }

        let metadata = IndexMetadata {
            format_version: Self::FORMAT_VERSION,
            dimension,
            metric: DistanceMetric::Cosine,
            created_at_unix: Utc::now().timestamp(),
            entry_count: entries.len() as u64,
        };

        debug!(entries = entries.len(), dimension, "built vector index");
        Ok(Self { metadata, entries })
    }

    /// Produce a new index containing this index's entries plus the given
    /// ones, in insertion order. Append-only: duplicate sources are kept,
    /// deduplication is a caller responsibility.
    ///
    /// # Errors
    /// Returns `EmptyInput` for zero chunks and `InvalidArgument` on a
    /// dimension mismatch.
    pub fn add(&self, entries: Vec<EmbeddedChunk>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::EmptyInput);
        }
        if let Err(message) = validate_entries(&entries, self.metadata.dimension) {
            return Err(Error::InvalidArgument(message));
        }

        let mut combined = self.entries.clone();
        combined.extend(entries);

        let metadata = IndexMetadata {
            format_version: Self::FORMAT_VERSION,
            dimension: self.metadata.dimension,
            metric: self.metadata.metric,
            created_at_unix: Utc::now().timestamp(),
            entry_count: combined.len() as u64,
        };

        debug!(entries = combined.len(), "extended vector index");
        Ok(Self {
            metadata,
            entries: combined,
        })
    }

    /// Reassemble an index from persisted parts.
    ///
    /// # Errors
    /// Returns `CorruptIndex` if the entries contradict the metadata
    /// (count mismatch or wrong dimensionality).
    pub fn from_parts(metadata: IndexMetadata, entries: Vec<EmbeddedChunk>) -> Result<Self> {
        if entries.len() as u64 != metadata.entry_count {
            return Err(Error::CorruptIndex(format!(
                "metadata declares {} entries but {} were read",
                metadata.entry_count,
                entries.len()
            )));
        }
        if let Err(message) = validate_entries(&entries, metadata.dimension) {
            return Err(Error::CorruptIndex(message));
        }
        Ok(Self { metadata, entries })
    }

    /// Answer a nearest-neighbor query.
    ///
    /// Similarity mode returns the top `k` by descending dot product with
    /// ties broken by insertion order; MMR mode reranks a similarity
    /// candidate pool for diversity. An optional score threshold excludes
    /// weaker candidates in both modes and may leave zero results, which
    /// callers treat as "no relevant context found", not an error.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the query vector's dimensionality does
    /// not match the index.
    pub fn search(&self, query_vector: &[f32], request: &SearchRequest) -> Result<Vec<ScoredChunk>> {
        if query_vector.len() != self.metadata.dimension {
            return Err(Error::InvalidArgument(format!(
                "query vector has {} dimensions (index has {})",
                query_vector.len(),
                self.metadata.dimension
            )));
        }
        if request.top_k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = self.scored_candidates(query_vector, request.score_threshold);

        let selected = match request.mode {
            SearchMode::Similarity => candidates.into_iter().take(request.top_k).collect(),
            SearchMode::Mmr => {
                let pool_size = request.top_k.saturating_mul(request.mmr_pool_multiplier);
                let pool: Vec<(usize, f32)> = candidates.into_iter().take(pool_size).collect();
                self.select_diverse(pool, request.top_k, request.mmr_lambda)
            }
        };

        Ok(selected
            .into_iter()
            .map(|(index, score)| ScoredChunk {
                chunk: self.entries[index].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Score every entry against the query, filter by threshold, and sort
    /// descending. The sort is stable, so equal scores keep insertion
    /// order.
    fn scored_candidates(
        &self,
        query_vector: &[f32],
        score_threshold: Option<f32>,
    ) -> Vec<(usize, f32)> {
        let mut scores: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (index, dot(query_vector, &entry.vector)))
            .filter(|(_, score)| score_threshold.is_none_or(|threshold| *score >= threshold))
            .collect();

        scores.sort_by(|first, second| {
            second.1.partial_cmp(&first.1).unwrap_or(Ordering::Equal)
        });
        scores
    }

    /// Maximal-marginal-relevance selection: repeatedly pick the candidate
    /// maximizing `lambda * relevance - (1 - lambda) * max_similarity` to
    /// the already-selected set.
    fn select_diverse(
        &self,
        mut pool: Vec<(usize, f32)>,
        top_k: usize,
        lambda: f32,
    ) -> Vec<(usize, f32)> {
        let mut selected: Vec<(usize, f32)> = Vec::with_capacity(top_k.min(pool.len()));

        while selected.len() < top_k && !pool.is_empty() {
            let mut best_position = 0;
            let mut best_score = f32::NEG_INFINITY;

            for (position, (candidate, relevance)) in pool.iter().enumerate() {
                let max_similarity = selected
                    .iter()
                    .map(|(chosen, _)| {
                        dot(&self.entries[*candidate].vector, &self.entries[*chosen].vector)
                    })
                    .fold(0.0f32, f32::max);

                let marginal = lambda * relevance - (1.0 - lambda) * max_similarity;
                if marginal > best_score {
                    best_score = marginal;
                    best_position = position;
                }
            }

            selected.push(pool.remove(best_position));
        }

        selected
    }

    /// Index metadata.
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[EmbeddedChunk] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Check that every entry's vector matches the expected dimensionality.
/// Returns a plain message for the caller to wrap in the right error
/// variant (`InvalidArgument` on build/add, `CorruptIndex` on load).
fn validate_entries(
    entries: &[EmbeddedChunk],
    dimension: usize,
) -> core::result::Result<(), String> {
    for (position, entry) in entries.iter().enumerate() {
        if entry.vector.len() != dimension {
            return Err(format!(
                "entry {position} ('{}' #{}) has a {}-dimensional vector (expected {dimension})",
                entry.chunk.source,
                entry.chunk.sequence_no,
                entry.vector.len()
            ));
        }
    }
    Ok(())
}

/// Dot product; equals cosine similarity for unit-normalized vectors.
fn dot(first: &[f32], second: &[f32]) -> f32 {
    first
        .iter()
        .zip(second.iter())
        .map(|(left, right)| left * right)
        .sum()
}
