// Chat service module
// HTTP front end answering questions from retrieved chunks

pub mod errors;


use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::{ChunkMetadata, VectorStore};
use crate::embeddings::{Embedder, OllamaClient};
use crate::llm::prompt::build_context;
use crate::llm::{LanguageModel, OllamaChatClient, PromptTemplate};
use crate::retrieval::{Retriever, VectorRetriever};

pub use errors::ApiError;

/// Extra time the chat HTTP call gets beyond `llm_timeout_secs`, so the
/// request-level timeout always fires first
const CHAT_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Answer returned when retrieval finds nothing; the model is not consulted
pub const NO_RESULTS_ANSWER: &str = "I couldn't find any relevant information.";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<ChunkMetadata>>,
}

/// Process-wide state built once at startup and shared by every request
pub struct AppContext {
    pub retriever: Arc<dyn Retriever>,
    pub llm: Arc<dyn LanguageModel>,
    pub prompt: PromptTemplate,
    pub top_k: usize,
    pub llm_timeout: Duration,
}

impl AppContext {
    /// Retrieve, prompt and generate for one question
    #[inline]
    pub async fn answer(&self, query: &str) -> Result<ChatResponse, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ApiError::InvalidRequest {
                message: "query must not be empty".to_string(),
            });
        }

        let results = self.retriever.similarity_search(query, self.top_k).await?;
        if results.is_empty() {
            debug!("No chunks matched, returning canned answer");
            return Ok(ChatResponse {
                answer: NO_RESULTS_ANSWER.to_string(),
                sources: None,
            });
        }

        let context = build_context(results.iter().map(|r| r.content.as_str()));
        let prompt = self.prompt.render(&context, query);
        debug!(
            "Prompting {} with {} chunks ({} chars)",
            self.llm.model(),
            results.len(),
            prompt.len()
        );

        let answer = tokio::time::timeout(self.llm_timeout, self.llm.generate(&prompt))
            .await
            .map_err(|_| ApiError::Timeout {
                seconds: self.llm_timeout.as_secs(),
            })?
            .map_err(|e| ApiError::Backend {
                message: format!("{e:#}"),
            })?;

        Ok(ChatResponse {
            answer,
            sources: Some(results.into_iter().map(|r| r.metadata).collect()),
        })
    }
}

/// Build the HTTP routes around a shared context
#[inline]
pub fn router(context: Arc<AppContext>, permissive_cors: bool) -> Router {
    let router = Router::new()
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(context);

    if permissive_cors {
        router.layer(CorsLayer::very_permissive())
    } else {
        router
    }
}

async fn chat_handler(
    State(context): State<Arc<AppContext>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    let response = context.answer(&request.query).await?;
    Ok(Json(response))
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Build the application context from configuration
#[inline]
pub async fn build_context_from_config(config: &Config) -> crate::Result<AppContext> {
    let embedder = OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?;
    check_backend(embedder.clone()).await;

    let store = VectorStore::open_existing(&config.storage.db_path).await?;
    let embedder: Arc<dyn Embedder> = Arc::new(embedder);
    let retriever = VectorRetriever::open(embedder, store).await?;

    let llm_timeout = Duration::from_secs(config.server.llm_timeout_secs);
    let llm = OllamaChatClient::new(&config.ollama)
        .context("Failed to initialize chat client")?
        .with_timeout(llm_timeout + CHAT_TIMEOUT_GRACE);
    let prompt = config
        .server
        .prompt_template()
        .map_err(|e| crate::RagError::Config(e.to_string()))?;

    Ok(AppContext {
        retriever: Arc::new(retriever),
        llm: Arc::new(llm),
        prompt,
        top_k: config.server.top_k,
        llm_timeout,
    })
}

/// Run the chat service until Ctrl-C
#[inline]
pub async fn serve(config: &Config) -> crate::Result<()> {
    info!("Initializing chat service");
    let context = Arc::new(build_context_from_config(config).await?);
    let app = router(context, config.server.permissive_cors);

    let address = (config.server.bind_address.as_str(), config.server.port);
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Chat service listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Chat service stopped");
    Ok(())
}

/// The service still starts when Ollama is down; requests then fail with 502
async fn check_backend(client: OllamaClient) {
    match tokio::task::spawn_blocking(move || client.health_check()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Ollama health check failed: {:#}", e),
        Err(e) => warn!("Ollama health check did not complete: {}", e),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
