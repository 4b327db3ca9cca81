//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Retrieval-augmented question answering over a local document corpus.
#[derive(Debug, Parser)]
#[command(name = "sibyl", version, about)]
pub struct Cli {
    /// Path to a configuration file (defaults to `~/.sibyl/config.toml`,
    /// created on first run).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest every plain-text document under a directory into a fresh
    /// index.
    Ingest {
        /// Directory holding the corpus documents.
        corpus_dir: PathBuf,
        /// Remove the existing index first and re-ingest from scratch.
        #[arg(long)]
        clear: bool,
    },
    /// Add a single document to the existing index.
    Add {
        /// Document to add.
        file: PathBuf,
    },
    /// Answer a question from the indexed corpus.
    Query {
        /// The question to answer.
        question: String,
        /// Search mode: `similarity` or `mmr`.
        #[arg(long = "search-type", default_value = "similarity")]
        search_type: String,
        /// Number of context chunks to retrieve (1..=20).
        #[arg(short = 'k', long = "top-k", default_value_t = 5)]
        top_k: usize,
    },
    /// Show the state of the persisted index.
    Status,
}
