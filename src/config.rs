use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    pub root: PathBuf,
    #[serde(default = "default_file_types")]
    pub file_types: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default)]
    pub max_depth: Option<usize>,
}

fn default_file_types() -> Vec<String> {
    vec!["pdf".to_string(), "docx".to_string(), "txt".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Window size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default)]
    pub strategy: ChunkStrategy,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            strategy: ChunkStrategy::default(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Fixed sliding window over the whole document.
    #[default]
    Sliding,
    /// Chapter-aware segmentation driven by structure detection.
    Chapter,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionConfig {
    #[serde(default)]
    pub detector: DetectorKind,
    #[serde(default)]
    pub ai: AiConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            detector: DetectorKind::default(),
            ai: AiConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Deterministic pattern scan only.
    #[default]
    Rules,
    /// AI-assisted extraction, demoted to the rule scan on any failure.
    Ai,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be smaller than chunking.chunk_size");
    }
    if config.scanner.file_types.is_empty() {
        anyhow::bail!("scanner.file_types must not be empty");
    }
    if config.detection.ai.timeout_secs == 0 {
        anyhow::bail!("detection.ai.timeout_secs must be > 0");
    }

    Ok(config)
}
