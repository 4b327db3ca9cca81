//! Sibyl CLI - retrieval-augmented question answering over a local
//! document corpus.
#![allow(
    clippy::print_stdout,
    reason = "Command output (answers, reports, status) goes to stdout"
)]
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::print_stderr,
        reason = "Allow for tests"
    )
)]

use anyhow::Result;
use clap::Parser as _;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

mod cli;
mod handlers;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout is reserved for command output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { corpus_dir, clear } => {
            handlers::handle_ingest(cli.config, corpus_dir, clear).await
        }
        Commands::Add { file } => handlers::handle_add(cli.config, file).await,
        Commands::Query {
            question,
            search_type,
            top_k,
        } => handlers::handle_query(cli.config, question, search_type, top_k).await,
        Commands::Status => handlers::handle_status(cli.config).await,
    }
}
