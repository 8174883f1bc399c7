use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory for the document index; the schema index lives in
    /// a `schema/` subdirectory beneath it.
    pub index_dir: PathBuf,
    /// Directory for the conversation-memory SQLite store.
    pub memory_dir: PathBuf,
}

impl StorageConfig {
    pub fn document_dir(&self) -> PathBuf {
        self.index_dir.clone()
    }

    pub fn schema_dir(&self) -> PathBuf {
        self.index_dir.join("schema")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Optional model override for the schema index. Falls back to `model`.
    #[serde(default)]
    pub schema_model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            schema_model: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Config variant for the schema index, with `schema_model` applied.
    pub fn for_schema(&self) -> EmbeddingConfig {
        let mut cfg = self.clone();
        if let Some(ref schema_model) = self.schema_model {
            cfg.model = Some(schema_model.clone());
        }
        cfg
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_generation_max_retries")]
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            url: None,
            temperature: 0.7,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_temperature() -> f64 {
    0.7
}
fn default_generation_timeout_secs() -> u64 {
    120
}
fn default_generation_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Results fetched per backend on a fan-out search.
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

fn default_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    250
}

impl Config {
    /// Minimal config rooted at a directory, with all providers disabled.
    /// Used by tests and commands that can run without a config file.
    pub fn minimal(root: &Path) -> Config {
        Config {
            storage: StorageConfig {
                index_dir: root.join("index"),
                memory_dir: root.join("memory"),
            },
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
            chunking: ChunkingConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate retrieval
    if config.retrieval.k < 1 {
        anyhow::bail!("retrieval.k must be >= 1");
    }

    // Validate chunking
    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }

    // Validate embedding
    if config.embedding.is_enabled() && config.embedding.model.is_none() {
        anyhow::bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }

    match config.embedding.provider.as_str() {
        "disabled" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or ollama.",
            other
        ),
    }

    // Validate generation
    if config.generation.is_enabled() && config.generation.model.is_none() {
        anyhow::bail!(
            "generation.model must be specified when provider is '{}'",
            config.generation.provider
        );
    }

    match config.generation.provider.as_str() {
        "disabled" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled or ollama.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_disabled_providers() {
        let cfg = Config::minimal(Path::new("/tmp/sqa-test"));
        assert!(!cfg.embedding.is_enabled());
        assert!(!cfg.generation.is_enabled());
        assert_eq!(cfg.retrieval.k, 4);
    }

    #[test]
    fn test_schema_dir_nested_under_index_dir() {
        let cfg = Config::minimal(Path::new("/data"));
        assert_eq!(cfg.storage.schema_dir(), PathBuf::from("/data/index/schema"));
    }

    #[test]
    fn test_for_schema_model_override() {
        let mut embedding = EmbeddingConfig::default();
        embedding.model = Some("nomic-embed-text".to_string());
        embedding.schema_model = Some("bge-small".to_string());
        assert_eq!(embedding.for_schema().model.as_deref(), Some("bge-small"));

        embedding.schema_model = None;
        assert_eq!(
            embedding.for_schema().model.as_deref(),
            Some("nomic-embed-text")
        );
    }
}
