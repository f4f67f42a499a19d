//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file, via
//! [`load_or_default`]) is a working config. [`load_config`] rejects values
//! the pipeline cannot run with, such as `window <= overlap`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use codepilot_core::ingest::ChunkingParams;
use codepilot_core::search::{RetrievalParams, MAX_K};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("./output")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_min_lines")]
    pub min_lines: usize,
    #[serde(default = "default_preview_lines")]
    pub preview_lines: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            overlap: default_overlap(),
            min_lines: default_min_lines(),
            preview_lines: default_preview_lines(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkingParams {
        ChunkingParams {
            window: self.window,
            overlap: self.overlap,
            min_lines: self.min_lines,
            preview_lines: self.preview_lines,
        }
    }
}

fn default_window() -> usize {
    80
}
fn default_overlap() -> usize {
    15
}
fn default_min_lines() -> usize {
    10
}
fn default_preview_lines() -> usize {
    12
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryConfig {
    #[serde(default = "default_include_exts")]
    pub include_exts: Vec<String>,
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default)]
    pub parallel: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            include_exts: default_include_exts(),
            exclude_dirs: default_exclude_dirs(),
            max_file_bytes: default_max_file_bytes(),
            parallel: false,
        }
    }
}

fn default_include_exts() -> Vec<String> {
    [
        ".py", ".ts", ".tsx", ".js", ".jsx", ".go", ".rs", ".java", ".kt", ".rb", ".php", ".c",
        ".h", ".cpp", ".hpp", ".cs", ".swift", ".scala", ".sh", ".md",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_exclude_dirs() -> Vec<String> {
    [
        ".git",
        "node_modules",
        "dist",
        "build",
        "target",
        "vendor",
        ".venv",
        "venv",
        "__pycache__",
        ".next",
        ".idea",
        ".vscode",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_file_bytes() -> u64 {
    1_000_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,
    #[serde(default = "default_oversample_factor")]
    pub oversample_factor: usize,
    #[serde(default = "default_boost_factor")]
    pub boost_factor: f32,
    #[serde(default = "default_true")]
    pub lexical_boost: bool,
    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            oversample_factor: default_oversample_factor(),
            boost_factor: default_boost_factor(),
            lexical_boost: true,
            search_timeout_secs: default_search_timeout_secs(),
        }
    }
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            oversample_factor: self.oversample_factor,
            boost_factor: self.boost_factor,
        }
    }
}

fn default_k() -> usize {
    5
}
fn default_oversample_factor() -> usize {
    5
}
fn default_boost_factor() -> f32 {
    0.1
}
fn default_true() -> bool {
    true
}
fn default_search_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override (OpenAI-compatible endpoint or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "hash".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_timeout_secs() -> u64 {
    30
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
    "127.0.0.1:8000".to_string()
}

impl Config {
    /// All defaults: hashing embedder, `./output` index dir.
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn chunks_path(&self) -> PathBuf {
        self.index.dir.join(crate::storage::CHUNKS_FILE)
    }

    pub fn index_path(&self) -> PathBuf {
        self.index.dir.join(crate::storage::INDEX_FILE)
    }
}

/// Load the config at `path`, falling back to [`Config::minimal`] when the
/// file does not exist.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::minimal())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.window <= config.chunking.overlap {
        anyhow::bail!(
            "chunking.window ({}) must be greater than chunking.overlap ({})",
            config.chunking.window,
            config.chunking.overlap
        );
    }

    // Validate retrieval
    if !(1..=MAX_K).contains(&config.retrieval.default_k) {
        anyhow::bail!("retrieval.default_k must be in [1, {}]", MAX_K);
    }
    if config.retrieval.oversample_factor < 1 {
        anyhow::bail!("retrieval.oversample_factor must be >= 1");
    }
    if config.retrieval.boost_factor < 0.0 {
        anyhow::bail!("retrieval.boost_factor must be >= 0.0");
    }

    // Validate embedding
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }
    match config.embedding.provider.as_str() {
        "hash" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() {
                anyhow::bail!(
                    "embedding.dims must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hash, openai, ollama, or local.",
            other
        ),
    }

    Ok(())
}
