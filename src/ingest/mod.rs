// Ingestion module
// Loads a document, chunks it, embeds every chunk and writes one batch to the store


use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::database::{EmbeddingRecord, VectorStore};
use crate::embeddings::{ChunkingConfig, ContentChunk, Embedder, chunk_pages};
use crate::loader::load_document;
use crate::{RagError, Result};

/// Number of chunks sent to the embedder between progress updates
const EMBED_GROUP_SIZE: usize = 64;

/// Outcome of a successful ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub pages: usize,
    pub chunks: usize,
    pub stored: usize,
    pub db_path: PathBuf,
}

/// Turns one source document into stored, embedded chunks
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    db_path: PathBuf,
    show_progress: bool,
}

impl Ingestor {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, chunking: ChunkingConfig, db_path: PathBuf) -> Self {
        Self {
            embedder,
            chunking,
            db_path,
            show_progress: false,
        }
    }

    /// Draw a progress bar on stderr while embedding
    #[inline]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Ingest `source`, writing progress lines to `out`.
    ///
    /// Nothing is written to disk unless every chunk was embedded, and a
    /// failed write removes whatever this run created.
    #[inline]
    pub async fn run<W: Write>(&self, source: &Path, out: &mut W) -> Result<IngestReport> {
        if !source.is_file() {
            return Err(RagError::Document(format!(
                "File '{}' not found. Please add a PDF to the folder.",
                source.display()
            )));
        }

        writeln!(out, "Step 1: Loading PDF...")?;
        let pages = load_document(source)?;
        writeln!(out, "Loaded {} pages.", pages.len())?;

        writeln!(out, "Step 2: Chunking text...")?;
        let chunks = chunk_pages(&pages, &self.chunking);
        writeln!(out, "Split into {} chunks.", chunks.len())?;

        writeln!(out, "Step 3: Creating vector store (this may take a moment)...")?;
        let records = self.embed_chunks(&chunks).await?;
        let stored = self.persist(records).await?;
        writeln!(out, "Success! Database saved to {}", self.db_path.display())?;

        Ok(IngestReport {
            pages: pages.len(),
            chunks: chunks.len(),
            stored,
            db_path: self.db_path.clone(),
        })
    }

    async fn embed_chunks(&self, chunks: &[ContentChunk]) -> Result<Vec<EmbeddingRecord>> {
        let bar = if self.show_progress && console::user_attended_stderr() {
            ProgressBar::new(chunks.len() as u64).with_style(
                ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding chunks")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            )
        } else {
            ProgressBar::hidden()
        };

        let model = self.embedder.model().to_string();
        let mut records = Vec::with_capacity(chunks.len());

        for group in chunks.chunks(EMBED_GROUP_SIZE) {
            let embedder = Arc::clone(&self.embedder);
            let texts: Vec<String> = group.iter().map(|c| c.content.clone()).collect();

            let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
                .await
                .context("Embedding task panicked")?
                .map_err(|e| RagError::Embedding(format!("{e:#}")))?;

            if vectors.len() != group.len() {
                return Err(RagError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    group.len(),
                    vectors.len()
                )));
            }

            records.extend(
                group
                    .iter()
                    .zip(vectors)
                    .map(|(chunk, vector)| EmbeddingRecord::from_chunk(chunk, vector, &model)),
            );
            bar.inc(group.len() as u64);
        }

        bar.finish_and_clear();
        debug!("Embedded {} chunks with model {}", records.len(), model);
        Ok(records)
    }

    async fn persist(&self, records: Vec<EmbeddingRecord>) -> Result<usize> {
        let created_dir = !self.db_path.exists();

        match self.write_store(records).await {
            Ok(stored) => {
                info!("Stored {} chunks in {}", stored, self.db_path.display());
                Ok(stored)
            }
            Err(e) => {
                if created_dir {
                    warn!(
                        "Ingestion failed, removing partially created store at {}",
                        self.db_path.display()
                    );
                    if let Err(cleanup) = std::fs::remove_dir_all(&self.db_path) {
                        warn!("Failed to remove {}: {}", self.db_path.display(), cleanup);
                    }
                }
                Err(e)
            }
        }
    }

    async fn write_store(&self, records: Vec<EmbeddingRecord>) -> Result<usize> {
        let store = VectorStore::create_or_open(&self.db_path).await?;
        store.store_embeddings_batch(records).await
    }
}
