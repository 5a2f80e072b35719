// Language model module
// Prompt construction and the chat completion client

pub mod ollama;
pub mod prompt;

use anyhow::Result;
use async_trait::async_trait;

pub use ollama::OllamaChatClient;
pub use prompt::{PromptStyle, PromptTemplate};

/// Generates an answer for a fully rendered prompt
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier of the chat model
    fn model(&self) -> &str;

    /// Send `prompt` to the model and return its reply verbatim
    async fn generate(&self, prompt: &str) -> Result<String>;
}
