// Database module
// Persistent vector storage for embedded chunks

pub mod lancedb;

pub use self::lancedb::{ChunkMetadata, EmbeddingRecord, SearchResult, VectorStore};
