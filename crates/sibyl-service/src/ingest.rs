//! Corpus and single-file ingestion.
//!
//! Document-format parsing is out of scope: the corpus is plain text
//! already. Ingestion chunks each document, embeds the chunks in batches,
//! and hands the result to the index manager. Outcomes are reported as
//! `{status, message}` rather than raised, so the transport layer can
//! relay them directly.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt as _};
use tokio::task::spawn_blocking;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use sibyl_core::config::ChunkingConfig;
use sibyl_core::{Chunk, EmbeddedChunk, Error, IngestReport, Result};
use sibyl_retrieval::{EmbeddingProvider, IndexManager, split};

/// Number of chunk texts sent to the embedder per batch request.
const EMBED_BATCH_SIZE: usize = 50;
/// Concurrent document reads during corpus ingestion.
const MAX_CONCURRENT_READS: usize = 16;
/// Extensions treated as plain-text documents.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "log"];

/// One loaded document: source identifier plus full text.
type LoadedDocument = (String, String);

/// Ingestion operations over a shared index manager.
pub struct IngestService<E: EmbeddingProvider> {
    manager: Arc<IndexManager>,
    embedder: E,
    chunking: ChunkingConfig,
}

impl<E: EmbeddingProvider> IngestService<E> {
    /// Create an ingest service.
    pub fn new(manager: Arc<IndexManager>, embedder: E, chunking: ChunkingConfig) -> Self {
        Self {
            manager,
            embedder,
            chunking,
        }
    }

    /// Ingest every plain-text document under `corpus_dir` into a fresh
    /// index.
    ///
    /// If a persisted index already exists and `clear_existing` is false,
    /// ingestion is skipped and reported as success (the index is already
    /// serving). With `clear_existing` the persisted state is removed
    /// first and the corpus indexed from scratch.
    pub async fn ingest(&self, corpus_dir: &Path, clear_existing: bool) -> IngestReport {
        match self.ingest_corpus(corpus_dir, clear_existing).await {
            Ok(report) => report,
            Err(failure) => {
                error!("corpus ingestion failed: {failure}");
                IngestReport::error(format!("Ingestion failed: {failure}"))
            }
        }
    }

    /// Add a single document to the existing index.
    ///
    /// Requires a published index to extend; run a full ingest first.
    pub async fn ingest_single(&self, file_path: &Path) -> IngestReport {
        match self.ingest_file(file_path).await {
            Ok(report) => report,
            Err(Error::IndexUnavailable) => IngestReport::error(
                "No index to extend: run a full corpus ingest before adding single files",
            ),
            Err(failure) => {
                error!("single-file ingestion failed: {failure}");
                IngestReport::error(format!("Ingestion failed: {failure}"))
            }
        }
    }

    async fn ingest_corpus(&self, corpus_dir: &Path, clear_existing: bool) -> Result<IngestReport> {
        if !corpus_dir.is_dir() {
            return Ok(IngestReport::error(format!(
                "Data directory not found: {}",
                corpus_dir.display()
            )));
        }

        if self.manager.store().exists().await {
            if !clear_existing {
                info!("index already exists; skipping ingestion");
                return Ok(IngestReport::success(
                    "Index already exists. Pass clear_existing=true to force re-ingestion",
                    0,
                    0,
                ));
            }
            self.manager.clear().await?;
        }

        info!(corpus = %corpus_dir.display(), "loading corpus documents");
        let files = collect_corpus_files(corpus_dir);
        if files.is_empty() {
            warn!("no documents were found in the corpus directory");
            return Ok(IngestReport::warning("No documents were loaded"));
        }

        let documents = read_documents(corpus_dir, files).await;
        let chunks = self.chunk_documents(&documents);
        if chunks.is_empty() {
            warn!("corpus produced no usable chunks");
            return Ok(IngestReport::warning(
                "No usable chunks could be produced from the documents",
            ));
        }

        let document_count = documents.len();
        let chunk_count = chunks.len();
        info!(
            documents = document_count,
            chunks = chunk_count,
            "embedding corpus chunks"
        );

        let embedded = self.embed_chunks(chunks).await?;
        self.manager
            .build_and_publish(embedded, self.embedder.dimension())
            .await?;

        Ok(IngestReport::success(
            format!(
                "Indexing complete: {chunk_count} chunks from {document_count} documents were indexed"
            ),
            document_count,
            chunk_count,
        ))
    }

    async fn ingest_file(&self, file_path: &Path) -> Result<IngestReport> {
        if !file_path.is_file() {
            return Ok(IngestReport::error(format!(
                "File not found: {}",
                file_path.display()
            )));
        }

        info!(file = %file_path.display(), "loading document");
        let text = fs::read_to_string(file_path)?;
        let source = source_name(file_path);

        let chunks = split(&source, &text, &self.chunking);
        if chunks.is_empty() {
            warn!(file = %file_path.display(), "document produced no usable chunks");
            return Ok(IngestReport::warning(
                "No usable chunks could be produced from the document",
            ));
        }

        let chunk_count = chunks.len();
        let embedded = self.embed_chunks(chunks).await?;
        self.manager.add_and_publish(embedded).await?;

        Ok(IngestReport::success(
            format!("Added successfully: {chunk_count} chunks were indexed"),
            1,
            chunk_count,
        ))
    }

    /// Chunk every document, keeping per-source sequence numbering.
    fn chunk_documents(&self, documents: &[LoadedDocument]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|(source, text)| split(source, text, &self.chunking))
            .collect()
    }

    /// Embed chunks in batches. A failed batch fails the whole operation:
    /// a partially embedded set is never indexed.
    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>> {
        let total = chunks.len();
        let mut embedded = Vec::with_capacity(total);

        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = self.embedder.embed_passages(&texts).await.map_err(|failure| {
                Error::Embedding(format!(
                    "batch failed after {} of {total} chunks: {failure}",
                    embedded.len()
                ))
            })?;

            for (chunk, vector) in batch.iter().cloned().zip(vectors) {
                embedded.push(EmbeddedChunk { chunk, vector });
            }
        }

        info!(chunks = embedded.len(), "✓ corpus chunks embedded");
        Ok(embedded)
    }
}

/// Collect plain-text files under the corpus directory, sorted for
/// deterministic chunk ordering.
fn collect_corpus_files(corpus_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(corpus_dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|dir_entry| dir_entry.file_type().is_file())
        .map(|dir_entry| dir_entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|extension| extension.to_str())
                .is_some_and(|extension| {
                    TEXT_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
                })
        })
        .collect();
    files.sort();
    files
}

/// Read documents concurrently with a bounded window; unreadable files
/// are skipped with a warning rather than failing the corpus.
async fn read_documents(corpus_dir: &Path, files: Vec<PathBuf>) -> Vec<LoadedDocument> {
    let mut tasks = FuturesUnordered::new();
    let mut documents = Vec::with_capacity(files.len());
    let mut file_iter = files.into_iter();

    for _ in 0..MAX_CONCURRENT_READS {
        if let Some(path) = file_iter.next() {
            tasks.push(spawn_read(corpus_dir, path));
        }
    }

    while let Some(joined) = tasks.next().await {
        if let Ok(Some(document)) = joined {
            documents.push(document);
        }
        if let Some(path) = file_iter.next() {
            tasks.push(spawn_read(corpus_dir, path));
        }
    }

    // Restore deterministic ordering lost to completion order.
    documents.sort();
    documents
}

/// Read one document on the blocking pool.
fn spawn_read(
    corpus_dir: &Path,
    path: PathBuf,
) -> tokio::task::JoinHandle<Option<LoadedDocument>> {
    let source = path
        .strip_prefix(corpus_dir)
        .map_or_else(|_| source_name(&path), |relative| relative.display().to_string());

    spawn_blocking(move || match fs::read_to_string(&path) {
        Ok(text) => Some((source, text)),
        Err(failure) => {
            warn!(file = %path.display(), "skipping unreadable file: {failure}");
            None
        }
    })
}

/// Source identifier for a standalone document: its file name.
fn source_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_corpus_files_filters_and_sorts() {
        let temp_dir = tempfile::TempDir::new().expect("create temp dir");
        fs::write(temp_dir.path().join("b.txt"), "beta").expect("write b");
        fs::write(temp_dir.path().join("a.md"), "alpha").expect("write a");
        fs::write(temp_dir.path().join("ignore.pdf"), "binary").expect("write pdf");

        let files = collect_corpus_files(temp_dir.path());

        let names: Vec<String> = files
            .iter()
            .map(|path| source_name(path))
            .collect();
        assert_eq!(names, vec!["a.md".to_owned(), "b.txt".to_owned()]);
    }

    #[test]
    fn test_source_name_uses_file_name() {
        assert_eq!(source_name(Path::new("/data/docs/guide.txt")), "guide.txt");
    }
}
