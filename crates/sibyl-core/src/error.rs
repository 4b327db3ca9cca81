use core::result::Result as CoreResult;
use std::io::Error as IoError;

use reqwest::Error as ReqwestError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for sibyl operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur across the sibyl workspace.
#[derive(Debug, Error)]
pub enum Error {
    /// The external embedding capability was unreachable or returned
    /// malformed output. Fatal to the current operation; not retried here.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// An index operation was given zero chunks.
    #[error("No chunks to index")]
    EmptyInput,

    /// No complete persisted index was found at the given location.
    #[error("No index found at: {0}")]
    NotFound(String),

    /// Persisted index metadata is present but the records cannot be fully
    /// reconstructed.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// Persisted index was written by an incompatible format version.
    #[error("Index format version {found} is not supported (expected {expected})")]
    VersionMismatch {
        /// Version found in the persisted metadata.
        found: u32,
        /// Version this build understands.
        expected: u32,
    },

    /// A query was attempted before any index exists. Callers surface this
    /// as "service not ready", never as an internal error.
    #[error("Index not ready: no index has been built or loaded yet")]
    IndexUnavailable,

    /// A caller-supplied argument was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The answer-synthesis collaborator failed.
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// An HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),
}

impl Error {
    /// Determines whether this error may succeed if retried.
    ///
    /// Returns `true` for transient failures of external collaborators.
    /// Retry policy belongs to the caller; nothing below the service layer
    /// retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Embedding(_) | Self::Synthesis(_))
    }

    /// Whether this error means "the service is not ready yet" rather than
    /// an internal failure. Maps to a service-unavailable condition at the
    /// transport boundary.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::IndexUnavailable)
    }

    /// Whether this error indicates unusable persisted state that requires
    /// re-ingestion to recover from.
    pub fn requires_reingest(&self) -> bool {
        matches!(self, Self::CorruptIndex(_) | Self::VersionMismatch { .. })
    }
}
