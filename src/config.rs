use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ledger::DEFAULT_FLUSH_EVERY;
use crate::models::{EmbeddingBackend, EmbeddingModel};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_token")]
    pub token: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: default_token(),
            database: default_database(),
            collection: default_collection(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_token() -> String {
    "root:Milvus".to_string()
}
fn default_database() -> String {
    "swagger_db".to_string()
}
fn default_collection() -> String {
    "swagger_endpoints".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingsConfig {
    #[serde(default)]
    pub models: Vec<EmbeddingModel>,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            ollama_url: default_ollama_url(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_summarizer_provider")]
    pub provider: String,
    #[serde(default = "default_summarizer_model")]
    pub model: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: default_summarizer_provider(),
            model: default_summarizer_model(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_summarizer_provider() -> String {
    "disabled".to_string()
}
fn default_summarizer_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,
    #[serde(default = "default_true")]
    pub flush_each_operation: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            checkpoint_file: default_checkpoint_file(),
            log_file: default_log_file(),
            flush_every: default_flush_every(),
            flush_each_operation: true,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache")
}
fn default_checkpoint_file() -> PathBuf {
    PathBuf::from("swagger_ingestion_progress.json")
}
fn default_log_file() -> PathBuf {
    PathBuf::from("swagger_ingestion_log.json")
}
fn default_flush_every() -> usize {
    DEFAULT_FLUSH_EVERY
}
fn default_true() -> bool {
    true
}

impl Config {
    /// Check the settings an ingestion run depends on.
    ///
    /// Called after command-line overrides are applied, so a run fails here
    /// before anything is fetched or written.
    pub fn validate(&self) -> Result<()> {
        if self.ingest.flush_every == 0 {
            bail!("ingest.flush_every must be > 0");
        }

        for model in &self.embeddings.models {
            if model.name.trim().is_empty() {
                bail!("embedding model name must not be empty ({})", model.provider);
            }
            if model.dimension == 0 {
                bail!(
                    "embedding dimension must be > 0 for '{}:{}'",
                    model.provider,
                    model.name
                );
            }
        }

        match self.summarizer.provider.as_str() {
            "disabled" | "openai" => {}
            other => bail!(
                "Unknown summarizer provider: '{}'. Must be disabled or openai.",
                other
            ),
        }

        Ok(())
    }

    /// Additional checks for runs that write to the vector store.
    pub fn validate_for_store(&self) -> Result<()> {
        self.validate()?;
        if self.embeddings.models.is_empty() {
            bail!("At least one embedding model is required (see --embedding).");
        }
        match &self.store.url {
            Some(url) if !url.trim().is_empty() => Ok(()),
            _ => bail!("A store URL is required (see --store-url or [store].url)."),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Load `path` if it exists, otherwise start from defaults.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

/// Parse an embedding descriptor written as `provider:name:dimension`.
///
/// The name may itself contain colons (`ollama:nomic-embed-text:v1.5:768`).
pub fn parse_embedding_model(s: &str) -> Result<EmbeddingModel, String> {
    let (provider, rest) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid PROVIDER:NAME:DIMENSION: '{}'", s))?;
    let (name, dimension) = rest
        .rsplit_once(':')
        .ok_or_else(|| format!("invalid PROVIDER:NAME:DIMENSION: '{}'", s))?;
    let provider = match provider {
        "openai" => EmbeddingBackend::Openai,
        "ollama" => EmbeddingBackend::Ollama,
        other => return Err(format!("unknown embedding provider '{}'", other)),
    };
    let dimension = dimension
        .parse::<usize>()
        .map_err(|_| format!("invalid embedding dimension '{}'", dimension))?;
    if name.is_empty() {
        return Err(format!("missing embedding model name in '{}'", s));
    }
    Ok(EmbeddingModel {
        provider,
        name: name.to_string(),
        dimension,
    })
}
