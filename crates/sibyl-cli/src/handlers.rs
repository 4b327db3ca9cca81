//! Subcommand handlers wiring configuration, the retrieval engine, and
//! the external collaborators together.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use chrono::DateTime;
use tracing::info;

use sibyl_core::{Error, IngestReport, IngestStatus, SearchMode, SibylConfig};
use sibyl_retrieval::{EmbeddingProvider as _, IndexManager, IndexStore, OllamaEmbedder};
use sibyl_service::{IngestService, OllamaSynthesizer, QueryService};

/// Load configuration from the override path or the default location.
fn load_config(config_path: Option<&Path>) -> Result<SibylConfig> {
    let config = match config_path {
        Some(path) => SibylConfig::load_from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SibylConfig::load_or_create().context("failed to load configuration")?,
    };
    Ok(config)
}

/// Build the shared index manager for the configured storage location.
fn build_manager(config: &SibylConfig) -> Arc<IndexManager> {
    Arc::new(IndexManager::new(IndexStore::new(
        config.storage.index_dir.clone(),
    )))
}

/// Relay an ingest report to the user; an error report becomes a nonzero
/// exit.
fn relay_report(report: &IngestReport) -> Result<()> {
    println!("[{}] {}", report.status, report.message);
    if report.status == IngestStatus::Error {
        bail!("ingestion failed");
    }
    Ok(())
}

/// Handle `sibyl ingest`.
pub async fn handle_ingest(
    config_path: Option<PathBuf>,
    corpus_dir: PathBuf,
    clear: bool,
) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let manager = build_manager(&config);
    let embedder = OllamaEmbedder::from_config(&config.embedding);

    embedder
        .ensure_model_available()
        .await
        .context("embedding model is not available")?;

    let ingests = IngestService::new(manager, embedder, config.chunking.clone());
    let report = ingests.ingest(&corpus_dir, clear).await;
    relay_report(&report)
}

/// Handle `sibyl add`.
pub async fn handle_add(config_path: Option<PathBuf>, file: PathBuf) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let manager = build_manager(&config);
    let embedder = OllamaEmbedder::from_config(&config.embedding);

    embedder
        .ensure_model_available()
        .await
        .context("embedding model is not available")?;

    let ingests = IngestService::new(manager, embedder, config.chunking.clone());
    let report = ingests.ingest_single(&file).await;
    relay_report(&report)
}

/// Handle `sibyl query`.
pub async fn handle_query(
    config_path: Option<PathBuf>,
    question: String,
    search_type: String,
    top_k: usize,
) -> Result<()> {
    let mode: SearchMode = search_type
        .parse()
        .map_err(|message: String| anyhow::anyhow!(message))?;

    let config = load_config(config_path.as_deref())?;
    let manager = build_manager(&config);
    let embedder = OllamaEmbedder::from_config(&config.embedding);
    let synthesizer = OllamaSynthesizer::from_config(&config.synthesis);

    let queries = QueryService::new(manager, embedder, synthesizer, config.search.clone());

    match queries.answer(&question, mode, top_k).await {
        Ok(answer) => {
            println!("{}", answer.answer);
            if !answer.sources.is_empty() {
                println!();
                println!("Sources:");
                for source in &answer.sources {
                    println!("  - {source}");
                }
            }
            Ok(())
        }
        Err(failure) if failure.is_not_ready() => {
            bail!("service not ready: no index exists yet; run `sibyl ingest` first")
        }
        Err(failure) => Err(failure).context("query failed"),
    }
}

/// Handle `sibyl status`.
pub async fn handle_status(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let store = IndexStore::new(config.storage.index_dir.clone());

    match store.load().await {
        Ok(index) => {
            let metadata = index.metadata();
            let created = DateTime::from_timestamp(metadata.created_at_unix, 0)
                .map_or_else(|| "unknown".to_owned(), |stamp| stamp.to_rfc3339());
            println!("index:      {}", store.path().display());
            println!("entries:    {}", metadata.entry_count);
            println!("dimension:  {}", metadata.dimension);
            println!("created:    {created}");
            Ok(())
        }
        Err(Error::NotFound(_)) => {
            println!("not ready: no index at {}", store.path().display());
            Ok(())
        }
        Err(failure) if failure.requires_reingest() => {
            info!("persisted index is unusable: {failure}");
            println!("unusable index ({failure}); re-ingestion is required");
            Ok(())
        }
        Err(failure) => Err(failure).context("failed to inspect index"),
    }
}
