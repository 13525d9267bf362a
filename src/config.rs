use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub solr: SolrConfig,
    #[serde(default)]
    pub reindex: ReindexConfig,
    #[serde(default)]
    pub source: Option<SourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SolrConfig {
    /// Base URL of the Solr core, e.g. `http://localhost:8983/solr`.
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReindexConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.solr.base_url.is_empty() {
        anyhow::bail!("solr.base_url must not be empty");
    }

    if config.reindex.batch_size == 0 {
        anyhow::bail!("reindex.batch_size must be > 0");
    }

    Ok(config)
}
