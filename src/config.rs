//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, see [`load_or_default`]) gives a working setup. See
//! `config/docqa.example.toml` for all keys.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::chunk::ChunkStrategy;
use crate::index::DEFAULT_TOP_K;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub table: TableConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub strategy: ChunkStrategy,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            strategy: ChunkStrategy::default(),
        }
    }
}

fn default_chunk_size() -> usize {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct TableConfig {
    /// Cap on values listed in a column answer.
    #[serde(default = "default_max_listed_values")]
    pub max_listed_values: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_listed_values: default_max_listed_values(),
        }
    }
}

fn default_max_listed_values() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_url: default_api_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
            api_version: default_api_version(),
        }
    }
}

impl AnswerConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "anthropic".to_string()
}
fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}
fn default_model() -> String {
    "claude-3-haiku-20240307".to_string()
}
fn default_max_tokens() -> u32 {
    800
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_api_key_env() -> String {
    "CLAUDE_API_KEY".to_string()
}
fn default_api_version() -> String {
    "2023-06-01".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

/// Parse and validate a config from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Like [`load_config`], but falls back to defaults when `path` does not exist.
/// A file that exists and fails to parse is still an error.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!("config {} not found, using defaults", path.display());
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }

    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }

    if config.table.max_listed_values == 0 {
        bail!("table.max_listed_values must be >= 1");
    }

    match config.answer.provider.as_str() {
        "disabled" | "anthropic" => {}
        other => bail!(
            "Unknown answer provider: '{}'. Must be disabled or anthropic.",
            other
        ),
    }

    if config.answer.is_enabled() {
        if config.answer.timeout_secs == 0 {
            bail!("answer.timeout_secs must be > 0");
        }
        if config.answer.max_tokens == 0 {
            bail!("answer.max_tokens must be > 0");
        }
        if config.answer.api_key_env.trim().is_empty() {
            bail!("answer.api_key_env must name an environment variable");
        }
    }

    Ok(())
}
