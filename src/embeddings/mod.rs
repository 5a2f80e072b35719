// Embeddings module
// Text chunking and the embedding service client

pub mod chunking;
pub mod ollama;

use anyhow::Result;

pub use chunking::{ChunkingConfig, ContentChunk, chunk_pages, split_text};
pub use ollama::{ModelInfo, OllamaClient};

/// Turns text into fixed-dimension vectors.
///
/// Every vector in a store must come from the same model, so implementors
/// report the model identifier alongside the vectors they produce.
pub trait Embedder: Send + Sync {
    /// Identifier of the embedding model
    fn model(&self) -> &str;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning one vector per input in order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}
