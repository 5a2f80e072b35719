#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::OllamaConfig;
use crate::embeddings::ollama::{build_agent, make_request_with_retry};
use crate::llm::LanguageModel;

/// Non-streaming client for the Ollama chat endpoint
#[derive(Debug, Clone)]
pub struct OllamaChatClient {
    inner: Arc<ChatInner>,
}

#[derive(Debug)]
struct ChatInner {
    base_url: Url,
    model: String,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaChatClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            inner: Arc::new(ChatInner {
                base_url,
                model: config.chat_model.clone(),
                agent: build_agent(Duration::from_secs(config.timeout_secs)),
                retry_attempts: config.retry_attempts.max(1),
            }),
        })
    }

    /// Replace the HTTP deadline, which otherwise comes from `timeout_secs`.
    /// Generation is usually far slower than embedding.
    #[inline]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let inner = &self.inner;
        Self {
            inner: Arc::new(ChatInner {
                base_url: inner.base_url.clone(),
                model: inner.model.clone(),
                agent: build_agent(timeout),
                retry_attempts: inner.retry_attempts,
            }),
        }
    }

    /// Send one user message and wait for the complete reply
    #[inline]
    pub fn chat_blocking(&self, prompt: &str) -> Result<String> {
        let inner = &self.inner;
        let url = inner
            .base_url
            .join("api/chat")
            .context("Failed to build chat URL")?;

        let request = ChatRequest {
            model: &inner.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize chat request")?;

        debug!(
            "Sending prompt of {} chars to chat model {}",
            prompt.len(),
            inner.model
        );

        let response_text = make_request_with_retry(&inner.base_url, inner.retry_attempts, || {
            inner
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Chat request failed")?;

        let response: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        debug!("Chat model replied with {} chars", response.message.content.len());
        Ok(response.message.content)
    }
}

#[async_trait]
impl LanguageModel for OllamaChatClient {
    fn model(&self) -> &str {
        &self.inner.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let client = self.clone();
        let prompt = prompt.to_string();

        tokio::task::spawn_blocking(move || client.chat_blocking(&prompt))
            .await
            .context("Chat task panicked")?
    }
}
