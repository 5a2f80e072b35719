use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use console::style;
use tokio::io::BufReader;
use tracing::info;

use crate::config::Config;
use crate::database::VectorStore;
use crate::embeddings::{Embedder, OllamaClient};
use crate::ingest::{IngestReport, Ingestor};
use crate::query::run_query_loop;
use crate::retrieval::VectorRetriever;
use crate::{RagError, Result};

/// Ingest `source`, or the configured document when none is given
#[inline]
pub async fn ingest_document(config: &Config, source: Option<PathBuf>) -> Result<IngestReport> {
    let source = source.unwrap_or_else(|| config.storage.document_path.clone());
    info!("Ingesting {}", source.display());

    let embedder: Arc<dyn Embedder> = Arc::new(
        OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?,
    );
    let ingestor = Ingestor::new(
        embedder,
        config.chunking.clone(),
        config.storage.db_path.clone(),
    )
    .with_progress(true);

    let mut stdout = std::io::stdout();
    ingestor.run(&source, &mut stdout).await
}

/// Answer questions typed on stdin until `exit`
#[inline]
pub async fn run_query(config: &Config) -> Result<()> {
    println!("Loading database...");

    let embedder: Arc<dyn Embedder> = Arc::new(
        OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?,
    );
    let store = VectorStore::open_existing(&config.storage.db_path).await?;
    let retriever = VectorRetriever::open(embedder, store).await?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let searched = run_query_loop(&retriever, &config.retrieval, stdin, &mut stdout).await?;

    info!("Query session ended after {} questions", searched);
    Ok(())
}

/// Start the HTTP chat service
#[inline]
pub async fn serve_chat(config: &Config) -> Result<()> {
    crate::server::serve(config).await
}

/// Print the effective configuration
#[inline]
pub fn show_config(config: &Config, config_path: &Path) -> Result<()> {
    println!("{}", style("Current Configuration").bold().cyan());
    println!();

    println!("{}", style("Ollama:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => println!("  URL: {}", style(url).cyan()),
        Err(e) => println!("  URL: {} ({})", style("Invalid").red(), e),
    }
    println!("  Embedding model: {}", style(&config.ollama.embedding_model).cyan());
    println!("  Chat model: {}", style(&config.ollama.chat_model).cyan());

    println!();
    println!("{}", style("Storage:").bold().yellow());
    println!(
        "  Document: {}",
        style(config.storage.document_path.display()).cyan()
    );
    println!("  Vector store: {}", style(config.storage.db_path.display()).cyan());

    println!();
    println!("{}", style("Chat service:").bold().yellow());
    println!(
        "  Listening on: {}",
        style(format!("{}:{}", config.server.bind_address, config.server.port)).cyan()
    );
    println!("  Top k: {}", style(config.server.top_k).cyan());

    println!();
    let file_state = if config_path.exists() {
        style("").dim()
    } else {
        style(" (not found, using defaults)").yellow()
    };
    println!(
        "Config file: {}{}",
        style(config_path.display()).dim(),
        file_state
    );
    println!();
    println!("{}", config.to_toml_string()?);

    Ok(())
}

/// Write a default configuration file, refusing to overwrite an existing one
#[inline]
pub fn init_config(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        return Err(RagError::Config(format!(
            "{} already exists",
            config_path.display()
        )));
    }

    Config::default().save(config_path)?;
    println!(
        "{} {}",
        style("Wrote default configuration to").green(),
        config_path.display()
    );
    Ok(())
}
