use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    /// Base URL of the platform, e.g. `https://canvas.instructure.com`.
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,
}

fn default_page_size() -> u32 {
    100
}
fn default_catalog_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            timeout_secs: default_oracle_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_oracle_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Minimum token-overlap score for a fuzzy course match.
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f64,
    /// Modules taken from catalog order when no module matches.
    #[serde(default = "default_fallback_modules")]
    pub fallback_modules: usize,
    /// Items taken from list order when the resource guess is unusable.
    #[serde(default = "default_fallback_resources")]
    pub fallback_resources: usize,
    /// Relevance assigned to fallback-selected items.
    #[serde(default = "default_fallback_score")]
    pub fallback_score: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: default_overlap_threshold(),
            fallback_modules: default_fallback_modules(),
            fallback_resources: default_fallback_resources(),
            fallback_score: default_fallback_score(),
        }
    }
}

fn default_overlap_threshold() -> f64 {
    0.2
}
fn default_fallback_modules() -> usize {
    2
}
fn default_fallback_resources() -> usize {
    3
}
fn default_fallback_score() -> f64 {
    0.8
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ArtifactsConfig {
    /// Directory for best-effort debug snapshots; disabled when unset.
    pub dir: Option<PathBuf>,
}

impl Config {
    /// A usable default configuration for running without a config file.
    pub fn minimal() -> Self {
        Self {
            catalog: CatalogConfig {
                base_url: "https://canvas.instructure.com".to_string(),
                page_size: default_page_size(),
                timeout_secs: default_catalog_timeout(),
            },
            oracle: OracleConfig::default(),
            pipeline: PipelineConfig::default(),
            server: ServerConfig {
                bind: "0.0.0.0:8000".to_string(),
            },
            artifacts: ArtifactsConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate catalog
    if config.catalog.base_url.is_empty() {
        anyhow::bail!("catalog.base_url must not be empty");
    }
    if !config.catalog.base_url.starts_with("http") {
        anyhow::bail!("catalog.base_url must be an http(s) URL");
    }
    if config.catalog.page_size == 0 {
        anyhow::bail!("catalog.page_size must be > 0");
    }

    // Validate pipeline
    if !(0.0..=1.0).contains(&config.pipeline.overlap_threshold) {
        anyhow::bail!("pipeline.overlap_threshold must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&config.pipeline.fallback_score) {
        anyhow::bail!("pipeline.fallback_score must be in [0.0, 1.0]");
    }
    if config.pipeline.fallback_modules == 0 {
        anyhow::bail!("pipeline.fallback_modules must be >= 1");
    }
    if config.pipeline.fallback_resources == 0 {
        anyhow::bail!("pipeline.fallback_resources must be >= 1");
    }

    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_applied() {
        let file = write_config(
            r#"
            [catalog]
            base_url = "https://canvas.example.edu"

            [server]
            bind = "127.0.0.1:8000"
            "#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.catalog.page_size, 100);
        assert_eq!(config.catalog.timeout_secs, 10);
        assert_eq!(config.oracle.timeout_secs, 30);
        assert_eq!(config.pipeline.overlap_threshold, 0.2);
        assert_eq!(config.pipeline.fallback_modules, 2);
        assert!(config.artifacts.dir.is_none());
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let file = write_config(
            r#"
            [catalog]
            base_url = "https://canvas.example.edu"

            [pipeline]
            overlap_threshold = 1.5

            [server]
            bind = "127.0.0.1:8000"
            "#,
        );
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let file = write_config(
            r#"
            [catalog]
            base_url = "canvas.example.edu"

            [server]
            bind = "127.0.0.1:8000"
            "#,
        );
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = load_or_default(Path::new("/nonexistent/scout.toml")).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8000");
    }
}
