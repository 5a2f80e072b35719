
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;
use crate::llm::prompt::{PromptStyle, PromptTemplate};

/// Environment variable that overrides the Ollama base URL
pub const BASE_URL_ENV: &str = "OLLAMA_BASE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub chunking: ChunkingConfig,
    pub storage: StorageConfig,
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    /// Path prefix in front of `api/...`, for Ollama behind a gateway
    pub base_path: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub batch_size: u32,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            base_path: "/".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            chat_model: "llama3".to_string(),
            batch_size: 16,
            timeout_secs: 60,
            retry_attempts: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Document read by `ingest` when no source is given on the command line
    pub document_path: PathBuf,
    /// Directory holding the LanceDB vector store
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            document_path: PathBuf::from("monopoly.pdf"),
            db_path: PathBuf::from("./rag_db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub preview_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            preview_chars: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub top_k: usize,
    pub prompt: PromptStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
    pub llm_timeout_secs: u64,
    pub permissive_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8000,
            top_k: 5,
            prompt: PromptStyle::default(),
            prompt_template: None,
            llm_timeout_secs: 120,
            permissive_cors: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid request timeout: {0} (must be between 1 and 3600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid chunk size: {0} (must be between 1 and 100000 characters)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("At least one chunk separator is required")]
    MissingSeparators,
    #[error("Invalid top-k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid preview length: {0} (must be at least 1 character)")]
    InvalidPreviewLength(usize),
    #[error("Invalid path for {0}: cannot be empty")]
    EmptyPath(&'static str),
    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),
    #[error("Prompt template must contain both {{context}} and {{question}} placeholders")]
    InvalidPromptTemplate,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist. `OLLAMA_BASE_URL` is applied before validation.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;
            toml::from_str::<Config>(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        let base_url = std::env::var(BASE_URL_ENV).ok();
        config
            .apply_base_url_override(base_url.as_deref())
            .with_context(|| format!("Invalid {BASE_URL_ENV} value"))?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save<P: AsRef<Path>>(&self, config_path: P) -> Result<()> {
        let config_path = config_path.as_ref();
        self.validate()
            .context("Configuration validation failed before saving")?;

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = self.to_toml_string()?;
        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config to TOML")
    }

    /// Replace the Ollama protocol, host, port and path prefix with the parts
    /// of `base_url`.
    #[inline]
    pub fn apply_base_url_override(&mut self, base_url: Option<&str>) -> Result<(), ConfigError> {
        let Some(raw) = base_url.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(());
        };

        let url = Url::parse(raw).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::InvalidUrl(raw.to_string()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ConfigError::InvalidUrl(raw.to_string()))?;

        debug!("Overriding Ollama base URL with {}", url);
        self.ollama.protocol = url.scheme().to_string();
        self.ollama.host = host.to_string();
        self.ollama.port = port;
        self.ollama.base_path = url.path().to_string();
        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.validate_chunking_config()?;
        self.validate_storage_config()?;
        self.validate_retrieval_config()?;
        self.server.validate()?;
        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if !(1..=100_000).contains(&config.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if config.chunk_overlap >= config.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                config.chunk_overlap,
                config.chunk_size,
            ));
        }

        if config.separators.is_empty() {
            return Err(ConfigError::MissingSeparators);
        }

        Ok(())
    }

    fn validate_storage_config(&self) -> Result<(), ConfigError> {
        if self.storage.document_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("storage.document_path"));
        }
        if self.storage.db_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("storage.db_path"));
        }
        Ok(())
    }

    fn validate_retrieval_config(&self) -> Result<(), ConfigError> {
        validate_top_k(self.retrieval.top_k)?;
        if self.retrieval.preview_chars == 0 {
            return Err(ConfigError::InvalidPreviewLength(
                self.retrieval.preview_chars,
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidUrl(format!(
                "{}://:{}",
                self.protocol, self.port
            )));
        }

        if !self.base_path.starts_with('/') {
            return Err(ConfigError::InvalidUrl(format!(
                "{}://{}:{}{}",
                self.protocol, self.host, self.port, self.base_path
            )));
        }

        self.ollama_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(1..=3600).contains(&self.timeout_secs) {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }

    /// Base URL of the Ollama API, always ending in `/` so that relative
    /// endpoint paths keep the prefix
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let path = self.base_path.trim_end_matches('/');
        let url_str = format!("{}://{}:{}{}/", self.protocol, self.host, self.port, path);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.bind_address.parse::<std::net::IpAddr>().is_err() {
            return Err(ConfigError::InvalidBindAddress(self.bind_address.clone()));
        }

        validate_top_k(self.top_k)?;

        if !(1..=3600).contains(&self.llm_timeout_secs) {
            return Err(ConfigError::InvalidTimeout(self.llm_timeout_secs));
        }

        if let Some(template) = &self.prompt_template {
            PromptTemplate::custom(template.clone())
                .map_err(|_| ConfigError::InvalidPromptTemplate)?;
        }

        Ok(())
    }

    /// Resolve the prompt template used by the chat service
    pub fn prompt_template(&self) -> Result<PromptTemplate, ConfigError> {
        match &self.prompt_template {
            Some(template) => PromptTemplate::custom(template.clone())
                .map_err(|_| ConfigError::InvalidPromptTemplate),
            None => Ok(PromptTemplate::from_style(self.prompt)),
        }
    }
}

fn validate_top_k(top_k: usize) -> Result<(), ConfigError> {
    if !(1..=100).contains(&top_k) {
        return Err(ConfigError::InvalidTopK(top_k));
    }
    Ok(())
}
