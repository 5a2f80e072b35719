// Configuration management module
// TOML settings shared by the ingest, query and serve commands

pub mod settings;


use std::path::PathBuf;

pub use settings::{
    BASE_URL_ENV, Config, ConfigError, OllamaConfig, RetrievalConfig, ServerConfig,
    StorageConfig,
};

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "rag.toml";

#[inline]
pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
