//! Process-wide configuration for chunking, embedding, search, storage,
//! and answer synthesis.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Complete sibyl configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SibylConfig {
    /// Document chunking configuration.
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Embedding capability configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Retrieval configuration.
    #[serde(default)]
    pub search: SearchConfig,
    /// Durable storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Answer-synthesis collaborator configuration.
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

/// Document chunking configuration.
///
/// Changing these values invalidates the semantic comparability of chunks
/// already embedded under the old configuration; re-ingest after changing
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks of one source.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            overlap: 200,
        }
    }
}

/// Embedding capability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the Ollama host serving the embedding model.
    pub host: String,
    /// Port of the Ollama host.
    pub port: u16,
    /// Embedding model name.
    pub model: String,
    /// Expected embedding dimensionality; vectors of any other length are
    /// rejected as malformed.
    pub dimension: usize,
    /// Prefix marker prepended to corpus passages before embedding.
    pub passage_prefix: String,
    /// Prefix marker prepended to queries before embedding.
    pub query_prefix: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            host: env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| "http://localhost:11434".to_owned()),
            port: 11434,
            model: "nomic-embed-text".to_owned(),
            dimension: 768,
            passage_prefix: "passage: ".to_owned(),
            query_prefix: "query: ".to_owned(),
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of chunks to retrieve per query.
    pub default_top_k: usize,
    /// Minimum similarity a candidate must reach to be returned. `None`
    /// disables the filter.
    pub score_threshold: Option<f32>,
    /// MMR relevance/diversity balance in `[0, 1]`.
    pub mmr_lambda: f32,
    /// MMR candidate pool size as a multiple of the requested k.
    pub mmr_pool_multiplier: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            score_threshold: Some(0.5),
            mmr_lambda: 0.5,
            mmr_pool_multiplier: 4,
        }
    }
}

/// Durable storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persisted index.
    pub index_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let index_dir = dirs::home_dir().map_or_else(
            || PathBuf::from(".sibyl/index"),
            |home| home.join(".sibyl").join("index"),
        );
        Self { index_dir }
    }
}

/// Answer-synthesis collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Base URL of the Ollama host serving the generation model.
    pub host: String,
    /// Generation model name.
    pub model: String,
    /// Sampling temperature for answer generation.
    pub temperature: f32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            host: env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| "http://localhost:11434".to_owned()),
            model: "llama3.2".to_owned(),
            temperature: 0.7,
        }
    }
}

impl SibylConfig {
    /// Get the default config directory path (`~/.sibyl`).
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined.
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".sibyl"))
    }

    /// Get the default config file path (`~/.sibyl/config.toml`).
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location (`~/.sibyl/config.toml`).
    /// If the config doesn't exist, creates it with default values.
    ///
    /// # Errors
    /// Returns an error if the config cannot be read, parsed, or created.
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            let config = Self::default();
            config.save_to_file(&config_path)?;
            Ok(config)
        }
    }

    /// Load config from a specific file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|error| Error::Config(format!("Failed to read config: {error}")))?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to a specific file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                Error::Config(format!("Failed to create config directory: {error}"))
            })?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;

        let header = "# Sibyl Configuration File\n\
                      # This file is automatically generated on first run\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))
            .map_err(|error| Error::Config(format!("Failed to write config: {error}")))?;

        Ok(())
    }

    /// Check the configuration for values the engine cannot operate with.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first invalid value found.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".to_owned()));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.overlap, self.chunking.chunk_size
            )));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::Config("embedding.dimension must be positive".to_owned()));
        }
        if !(0.0..=1.0).contains(&self.search.mmr_lambda) {
            return Err(Error::Config(format!(
                "search.mmr_lambda ({}) must be within [0, 1]",
                self.search.mmr_lambda
            )));
        }
        if self.search.mmr_pool_multiplier == 0 {
            return Err(Error::Config(
                "search.mmr_pool_multiplier must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = SibylConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.chunk_size, 2000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.search.score_threshold, Some(0.5));
    }

    #[test]
    fn test_serialization_round_trip() {
        let config = SibylConfig::default();
        let toml_text = toml::to_string_pretty(&config).expect("serialize config");
        let deserialized: SibylConfig = toml::from_str(&toml_text).expect("deserialize config");
        assert_eq!(config.embedding.model, deserialized.embedding.model);
        assert_eq!(config.storage.index_dir, deserialized.storage.index_dir);
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let mut temp_file = NamedTempFile::new().expect("create temp file");
        temp_file
            .write_all(b"[chunking]\nchunk_size = 500\noverlap = 50\n")
            .expect("write temp file");

        let config =
            SibylConfig::load_from_file(temp_file.path()).expect("load partial config");
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 50);
        // Untouched sections fall back to defaults.
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.search.default_top_k, 5);
    }

    #[test]
    fn test_validate_rejects_overlap_not_below_chunk_size() {
        let mut config = SibylConfig::default();
        config.chunking.overlap = config.chunking.chunk_size;
        let error = config.validate().expect_err("overlap must be rejected");
        assert!(matches!(error, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_out_of_range_lambda() {
        let mut config = SibylConfig::default();
        config.search.mmr_lambda = 1.5;
        assert!(config.validate().is_err());
    }
}
