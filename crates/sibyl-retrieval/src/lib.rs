//! Vector index lifecycle and retrieval engine.
//!
//! This crate owns the path from raw document text to ranked retrieval
//! results: chunking, embedding through an external capability, the
//! in-memory nearest-neighbor index, durable persistence with atomic
//! replace, and the process-wide snapshot manager that keeps concurrent
//! readers and serialized writers consistent.

/// Document chunking on structural boundaries with overlap.
pub mod chunker;
/// Embedder adapter over the external embedding capability.
pub mod embedder;
/// In-memory nearest-neighbor index over embedded chunks.
pub mod index;
/// Process-wide snapshot lifecycle and write serialization.
pub mod manager;
/// Durable index persistence with atomic replace.
pub mod store;

pub use chunker::split;
pub use embedder::{EmbeddingProvider, OllamaEmbedder, normalize};
pub use index::{DistanceMetric, IndexMetadata, VectorIndex};
pub use manager::{IndexManager, Snapshot};
pub use store::IndexStore;
