//! Ingest and query operations over the sibyl retrieval engine.
//!
//! This crate is the boundary the transport layer calls into: corpus and
//! single-file ingestion with `{status, message}` reports, and
//! question answering that retrieves ranked context and delegates answer
//! synthesis to an external language-model collaborator.

/// Corpus and single-file ingestion.
pub mod ingest;
/// Retrieval and question answering.
pub mod query;
/// Answer-synthesis collaborator contract and Ollama implementation.
pub mod synthesis;

pub use ingest::IngestService;
pub use query::QueryService;
pub use synthesis::{AnswerSynthesizer, OllamaSynthesizer};
