// LanceDB vector database module
// Handles vector storage and similarity search for embeddings


pub mod vector_store;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embeddings::chunking::ContentChunk;

pub use vector_store::{SearchResult, TABLE_NAME, VectorStore};

/// Chunk text and vector stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique identifier for this record
    pub id: String,
    /// The vector embedding
    pub vector: Vec<f32>,
    /// The chunk text
    pub content: String,
    /// Where the chunk came from
    pub metadata: ChunkMetadata,
    /// Model that produced `vector`
    pub embedding_model: String,
    /// RFC 3339 timestamp of ingestion
    pub created_at: String,
}

/// Pass-through metadata returned to clients as a chunk's source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the source document
    pub source: String,
    /// 1-based page number within the source
    pub page: u32,
    /// Index of the chunk within the source document
    pub chunk_index: u32,
}

impl EmbeddingRecord {
    /// Build a record for `chunk` with a fresh id
    #[inline]
    pub fn from_chunk(chunk: &ContentChunk, vector: Vec<f32>, embedding_model: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vector,
            content: chunk.content.clone(),
            metadata: ChunkMetadata {
                source: chunk.metadata.source.display().to_string(),
                page: chunk.metadata.page,
                chunk_index: u32::try_from(chunk.chunk_index).unwrap_or(u32::MAX),
            },
            embedding_model: embedding_model.to_string(),
            created_at: Utc::now().to_rfc3339(),
        }
    }
}
