//! Configuration loading for ragkiln: TOML file, overlaid with
//! `RAGKILN_`-prefixed environment variables.
//!
//! This crate deliberately stays small: one typed struct tree, one loader
//! function, documented defaults for every configurable item.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "test-utils")]
pub mod test_utils;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid env override {key}={value}: {reason}")]
    EnvOverride {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Paragraph,
    FullDoc,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub rate_delay_s: f64,
    pub max_retries: u32,
    pub retry_base_delay_s: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            rate_delay_s: 4.5,
            max_retries: 3,
            retry_base_delay_s: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub base_url: String,
    pub rate_delay_s: f64,
    pub max_retries: u32,
    pub retry_base_delay_s: f64,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            rate_delay_s: 0.1,
            max_retries: 3,
            retry_base_delay_s: 2.0,
            batch_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub threshold_high: f32,
    pub threshold_low: f32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            threshold_high: 0.85,
            threshold_low: 0.40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub dsn: String,
    pub pool_min: u32,
    pub pool_max: u32,
    pub pool_acquire_timeout_s: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            dsn: "postgres://localhost/ragkiln".to_string(),
            pool_min: 1,
            pool_max: 10,
            pool_acquire_timeout_s: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub max_prefix_chars: usize,
    pub skip_patterns: Vec<String>,
    pub dedup_title_ratio: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_prefix_chars: 4000,
            skip_patterns: vec![
                ".xml".to_string(),
                "opensearch".to_string(),
                ".rss".to_string(),
                "sitemap".to_string(),
            ],
            dedup_title_ratio: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    pub max_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { max_tokens: 400 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    pub llm_concurrency: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self { llm_concurrency: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub start_url: String,
    pub max_pages: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_url: String::new(),
            max_pages: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagkilnConfig {
    pub mode: Mode,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub merge: MergeConfig,
    pub db: DbConfig,
    pub extractor: ExtractorConfig,
    pub chunker: ChunkerConfig,
    pub parallel: ParallelConfig,
    pub crawl: CrawlConfig,
    pub logging: LoggingConfig,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Paragraph
    }
}

impl Default for RagkilnConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            merge: MergeConfig::default(),
            db: DbConfig::default(),
            extractor: ExtractorConfig::default(),
            chunker: ChunkerConfig::default(),
            parallel: ParallelConfig::default(),
            crawl: CrawlConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

const ENV_PREFIX: &str = "RAGKILN_";

/// Loads configuration from an optional TOML file, then overlays any
/// `RAGKILN_`-prefixed environment variables that name a known scalar
/// field, e.g. `RAGKILN_DB_DSN`, `RAGKILN_MERGE_THRESHOLD_HIGH`.
pub fn load(path: Option<&Path>) -> Result<RagkilnConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            toml::from_str(&text)?
        }
        None => RagkilnConfig::default(),
    };
    apply_env_overrides(&mut config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut RagkilnConfig) -> Result<(), ConfigError> {
    for (key, value) in std::env::vars() {
        let Some(field) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        apply_one_override(config, field, &value)?;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::EnvOverride {
        key: key.to_string(),
        value: value.to_string(),
        reason: format!("not a valid {}", std::any::type_name::<T>()),
    })
}

fn apply_one_override(config: &mut RagkilnConfig, field: &str, value: &str) -> Result<(), ConfigError> {
    match field {
        "DB_DSN" => config.db.dsn = value.to_string(),
        "DB_POOL_MIN" => config.db.pool_min = parse_env(field, value)?,
        "DB_POOL_MAX" => config.db.pool_max = parse_env(field, value)?,
        "LLM_MODEL" => config.llm.model = value.to_string(),
        "LLM_BASE_URL" => config.llm.base_url = value.to_string(),
        "LLM_RATE_DELAY_S" => config.llm.rate_delay_s = parse_env(field, value)?,
        "EMBEDDING_MODEL" => config.embedding.model = value.to_string(),
        "EMBEDDING_BASE_URL" => config.embedding.base_url = value.to_string(),
        "EMBEDDING_RATE_DELAY_S" => config.embedding.rate_delay_s = parse_env(field, value)?,
        "EMBEDDING_BATCH_SIZE" => config.embedding.batch_size = parse_env(field, value)?,
        "MERGE_THRESHOLD_HIGH" => config.merge.threshold_high = parse_env(field, value)?,
        "MERGE_THRESHOLD_LOW" => config.merge.threshold_low = parse_env(field, value)?,
        "PARALLEL_LLM_CONCURRENCY" => config.parallel.llm_concurrency = parse_env(field, value)?,
        "CRAWL_START_URL" => config.crawl.start_url = value.to_string(),
        "CRAWL_MAX_PAGES" => config.crawl.max_pages = parse_env(field, value)?,
        "LOGGING_FILTER" => config.logging.filter = value.to_string(),
        _ => {
            tracing::debug!(field, "unrecognized RAGKILN_ env override, ignoring");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_section_6() {
        let config = RagkilnConfig::default();
        assert_eq!(config.merge.threshold_high, 0.85);
        assert_eq!(config.merge.threshold_low, 0.40);
        assert_eq!(config.embedding.batch_size, 100);
        assert_eq!(config.db.pool_min, 1);
        assert_eq!(config.db.pool_max, 10);
        assert_eq!(config.parallel.llm_concurrency, 4);
        assert_eq!(config.llm.rate_delay_s, 4.5);
        assert_eq!(config.embedding.rate_delay_s, 0.1);
    }

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragkiln.toml");
        std::fs::write(
            &path,
            r#"
            [merge]
            threshold_high = 0.9
            "#,
        )
        .unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.merge.threshold_high, 0.9);
        // Unspecified fields keep their defaults.
        assert_eq!(config.merge.threshold_low, 0.40);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load(Some(Path::new("/nonexistent/ragkiln.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    #[serial_test::serial]
    fn env_override_wins_over_file_default() {
        std::env::set_var("RAGKILN_MERGE_THRESHOLD_HIGH", "0.77");
        let config = load(None).unwrap();
        std::env::remove_var("RAGKILN_MERGE_THRESHOLD_HIGH");
        assert_eq!(config.merge.threshold_high, 0.77);
    }

    #[test]
    #[serial_test::serial]
    fn invalid_env_override_is_reported() {
        std::env::set_var("RAGKILN_MERGE_THRESHOLD_HIGH", "not-a-float");
        let err = load(None).unwrap_err();
        std::env::remove_var("RAGKILN_MERGE_THRESHOLD_HIGH");
        assert!(matches!(err, ConfigError::EnvOverride { .. }));
    }
}
