//! Core types and error handling for the sibyl retrieval engine.
//!
//! This crate provides the shared data model (chunks, embedded chunks,
//! search requests, ingest reports), the error taxonomy, and process-wide
//! configuration used across the sibyl workspace.

/// Process-wide configuration types.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Core data types for chunks, search, and service reports.
pub mod types;

pub use config::SibylConfig;
pub use error::{Error, Result};
pub use types::{
    Answer, Chunk, EmbeddedChunk, IngestReport, IngestStatus, ScoredChunk, SearchMode,
    SearchRequest,
};
