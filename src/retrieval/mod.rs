// Retrieval module
// Similarity search over the vector store for a free-text query


use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::database::{ChunkMetadata, VectorStore};
use crate::embeddings::Embedder;
use crate::{RagError, Result};

/// A stored chunk matched by a query, best match first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Higher is more similar
    pub score: f32,
}

/// Finds the stored chunks nearest to a query
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return at most `k` chunks ranked by decreasing similarity
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>>;
}

/// Embeds the query with the ingestion model and searches the LanceDB store
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<VectorStore>,
}

impl VectorRetriever {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Open an ingested store for reading.
    /// A store built with a different embedding model is logged, not rejected.
    #[inline]
    pub async fn open(embedder: Arc<dyn Embedder>, store: VectorStore) -> Result<Self> {
        match store.recorded_embedding_model().await? {
            Some(recorded) if recorded != embedder.model() => {
                warn!(
                    "Store at {} was built with embedding model '{}' but '{}' is configured; \
                     similarity scores will be meaningless",
                    store.path().display(),
                    recorded,
                    embedder.model()
                );
            }
            Some(_) => {}
            None => warn!(
                "Store at {} contains no chunks yet; every search will come back empty",
                store.path().display()
            ),
        }

        Ok(Self::new(embedder, Arc::new(store)))
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedder = Arc::clone(&self.embedder);
        let text = query.to_string();
        let query_vector = tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .context("Embedding task panicked")?
            .map_err(|e| RagError::Embedding(format!("{e:#}")))?;

        let results = self.store.search_similar(&query_vector, k).await?;
        debug!("Query matched {} chunks", results.len());

        Ok(results
            .into_iter()
            .map(|result| RetrievedChunk {
                content: result.content,
                metadata: result.metadata,
                score: result.similarity_score,
            })
            .collect())
    }
}
