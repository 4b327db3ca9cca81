//! Durable index persistence with atomic replace.
//!
//! On-disk layout is one directory holding `meta.json` (human-inspectable
//! metadata with an explicit format version) and `records.bin` (bincode
//! record list). Writes stage both files in a sibling temporary directory
//! and swap it in with renames, so a crash mid-write never leaves a
//! partially written index where `load` would observe it.

use std::path::{Path, PathBuf};

use bincode::config::standard as bincode_config;
use bincode::{Decode, Encode, decode_from_slice, encode_to_vec};
use tempfile::Builder as TempDirBuilder;
use tokio::fs as async_fs;
use tokio::task::spawn_blocking;
use tracing::{info, warn};

use crate::index::{IndexMetadata, VectorIndex};
use sibyl_core::{Chunk, EmbeddedChunk, Error, Result};

/// Metadata file name inside the index directory.
const META_FILE: &str = "meta.json";
/// Record file name inside the index directory.
const RECORDS_FILE: &str = "records.bin";

/// One persisted (chunk, vector) record.
#[derive(Debug, Clone, Encode, Decode)]
struct PersistedRecord {
    /// Chunk text.
    text: String,
    /// Originating document identifier.
    source: String,
    /// 0-based chunk position within its source.
    sequence_no: usize,
    /// Embedding vector.
    vector: Vec<f32>,
}

/// The full persisted record list.
#[derive(Debug, Encode, Decode)]
struct RecordSet {
    records: Vec<PersistedRecord>,
}

/// Persists and restores the vector index at a fixed directory.
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    /// Create a store rooted at the given index directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Directory this store persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the index to the target directory, replacing any prior
    /// content atomically. On success the previous index (if any) is fully
    /// superseded; on failure the previous index is left untouched.
    ///
    /// # Errors
    /// Returns an error if staging, serialization, or the final swap
    /// fails.
    pub async fn save(&self, index: &VectorIndex) -> Result<()> {
        let parent = self.parent_dir()?;
        async_fs::create_dir_all(&parent).await?;

        let metadata_bytes = serde_json::to_vec_pretty(index.metadata())?;
        let records: Vec<PersistedRecord> = index
            .entries()
            .iter()
            .map(|entry| PersistedRecord {
                text: entry.chunk.text.clone(),
                source: entry.chunk.source.clone(),
                sequence_no: entry.chunk.sequence_no,
                vector: entry.vector.clone(),
            })
            .collect();

        // Encoding is CPU-bound; keep it off the async workers.
        let record_bytes = spawn_blocking(move || {
            encode_to_vec(RecordSet { records }, bincode_config()).map_err(|error| {
                Error::CorruptIndex(format!("failed to serialize records: {error}"))
            })
        })
        .await
        .map_err(|error| Error::CorruptIndex(format!("serialization task failed: {error}")))??;

        // Stage next to the target so the final rename stays on one
        // filesystem.
        let staging = TempDirBuilder::new()
            .prefix(".staging-")
            .tempdir_in(&parent)?;
        async_fs::write(staging.path().join(META_FILE), &metadata_bytes).await?;
        async_fs::write(staging.path().join(RECORDS_FILE), &record_bytes).await?;

        self.swap_in(staging.keep()).await?;

        info!(
            entries = index.len(),
            path = %self.path.display(),
            "✓ index persisted"
        );
        Ok(())
    }

    /// Restore the index from the target directory.
    ///
    /// # Errors
    /// Returns `NotFound` if no index metadata exists at the path,
    /// `VersionMismatch` if it was written by an incompatible format
    /// version, and `CorruptIndex` if the records cannot be fully
    /// reconstructed (undecodable data, truncated file, count or
    /// dimensionality mismatch).
    pub async fn load(&self) -> Result<VectorIndex> {
        let metadata_bytes = match async_fs::read(self.path.join(META_FILE)).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(self.path.display().to_string()));
            }
            Err(error) => return Err(error.into()),
        };

        let metadata: IndexMetadata = serde_json::from_slice(&metadata_bytes)
            .map_err(|error| Error::CorruptIndex(format!("unreadable metadata: {error}")))?;

        if metadata.format_version != VectorIndex::FORMAT_VERSION {
            return Err(Error::VersionMismatch {
                found: metadata.format_version,
                expected: VectorIndex::FORMAT_VERSION,
            });
        }

        let record_bytes = match async_fs::read(self.path.join(RECORDS_FILE)).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::CorruptIndex("records file is missing".to_owned()));
            }
            Err(error) => return Err(error.into()),
        };

        let record_set: RecordSet = spawn_blocking(move || {
            decode_from_slice(&record_bytes, bincode_config())
                .map(|(record_set, _)| record_set)
                .map_err(|error| Error::CorruptIndex(format!("undecodable records: {error}")))
        })
        .await
        .map_err(|error| Error::CorruptIndex(format!("deserialization task failed: {error}")))??;

        let entries: Vec<EmbeddedChunk> = record_set
            .records
            .into_iter()
            .map(|record| EmbeddedChunk {
                chunk: Chunk::new(record.text, record.source, record.sequence_no),
                vector: record.vector,
            })
            .collect();

        let index = VectorIndex::from_parts(metadata, entries)?;
        info!(
            entries = index.len(),
            path = %self.path.display(),
            "index loaded from disk"
        );
        Ok(index)
    }

    /// Whether a complete, loadable index is present, not merely whether
    /// the directory exists.
    pub async fn exists(&self) -> bool {
        self.load().await.is_ok()
    }

    /// Remove any persisted index at the target directory.
    ///
    /// # Errors
    /// Returns an error if existing content cannot be removed.
    pub async fn clear(&self) -> Result<()> {
        match async_fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "persisted index removed");
                Ok(())
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    /// Swap a fully staged directory into the target location. The prior
    /// content is renamed aside first, then removed once the new content
    /// is in place.
    async fn swap_in(&self, staged: PathBuf) -> Result<()> {
        let retired = self.retired_path()?;

        if async_fs::metadata(&retired).await.is_ok() {
            async_fs::remove_dir_all(&retired).await?;
        }
        let had_previous = match async_fs::rename(&self.path, &retired).await {
            Ok(()) => true,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => false,
            Err(error) => return Err(error.into()),
        };

        if let Err(error) = async_fs::rename(&staged, &self.path).await {
            // Put the previous index back so a failed save never loses it.
            if had_previous && async_fs::rename(&retired, &self.path).await.is_err() {
                warn!(
                    path = %self.path.display(),
                    "failed to restore previous index after aborted swap"
                );
            }
            return Err(error.into());
        }

        if had_previous && let Err(error) = async_fs::remove_dir_all(&retired).await {
            warn!(
                path = %retired.display(),
                "failed to remove superseded index: {error}"
            );
        }
        Ok(())
    }

    /// Parent directory of the index directory.
    fn parent_dir(&self) -> Result<PathBuf> {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                Error::Config(format!(
                    "index directory {} has no parent to stage in",
                    self.path.display()
                ))
            })
    }

    /// Sibling path the superseded index is briefly renamed to during a
    /// swap.
    fn retired_path(&self) -> Result<PathBuf> {
        let name = self.path.file_name().ok_or_else(|| {
            Error::Config(format!(
                "index directory {} has no final component",
                self.path.display()
            ))
        })?;
        let mut retired = name.to_os_string();
        retired.push(".old");
        Ok(self.path.with_file_name(retired))
    }
}
