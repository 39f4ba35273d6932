//! Configuration management for catfinder
//!
//! Settings are read from `./config/catfinder.toml` (or an explicit `--config`
//! path). When neither exists the embedded default document is used. No
//! defaults exist in source code: they all live in the config template.

use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::rate_limit::DelayRange;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/catfinder.toml";

/// Default configuration file content - this is the ONLY place defaults exist
pub const DEFAULT_CONFIG: &str = include_str!("../config/catfinder.toml");

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Invalid delay range in '{field}': min {min}ms is greater than max {max}ms")]
    InvalidDelayRange { field: String, min: u64, max: u64 },

    #[error("Unsupported CSV encoding '{0}' (expected 'utf-8' or 'utf-8-sig')")]
    UnsupportedEncoding(String),

    #[error("CSV delimiter must be a single ASCII character, got '{0}'")]
    InvalidDelimiter(String),

    #[error("Unknown log level '{0}' (expected trace, debug, info, warn or error)")]
    InvalidLogLevel(String),
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub sources: SourcesConfig,
    pub search: SearchConfig,
    pub collector: CollectorConfig,
    pub http: HttpConfig,
    pub evidence: EvidenceConfig,
    pub output: OutputConfig,
}

/// Base URLs of the directory backends
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    pub directory_base_url: String,
    pub registry_base_url: String,
}

/// Revenue threshold and keyword lists
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub min_revenue: u64,
    pub revenue_year: u16,
    pub keywords_cat: Vec<String>,
    pub cat_products: Vec<String>,
    /// Product tokens that count as high-confidence evidence
    pub strong_keywords: Vec<String>,
    /// Keyword tokens listed under "Products mentioned" in the evidence summary
    pub product_keywords: Vec<String>,
}

/// Collector strategies: search terms, link caps and pacing
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    pub search_keywords: Vec<String>,
    pub revenue_sort_terms: Vec<String>,
    pub registry_query: String,
    pub links_per_keyword: usize,
    pub links_per_revenue_term: usize,
    pub registry_link_limit: usize,
    pub keyword_strategy_limit: usize,
    pub keyword_delay_ms: DelayRange,
    pub revenue_term_delay_ms: DelayRange,
    pub registry_delay_ms: DelayRange,
    pub strategy_delay_ms: DelayRange,
}

/// Retry backoff strategy
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Linear,
    Exponential,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Total attempts per URL (first try included)
    pub max_retries: u32,
    pub backoff: BackoffStrategy,
    pub backoff_base_delay_ms: u64,
    pub backoff_max_delay_ms: u64,
    pub request_delay_ms: DelayRange,
    pub user_agent_rotation: bool,
    pub user_agents: Vec<String>,
    pub accept_language: String,
    pub max_body_bytes: usize,
}

impl HttpConfig {
    /// Delay to wait after the given failed attempt (1-indexed)
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay_ms = match self.backoff {
            BackoffStrategy::Linear => self.backoff_base_delay_ms.saturating_mul(attempt as u64),
            BackoffStrategy::Exponential => {
                let factor = 2u64.saturating_pow(attempt - 1);
                self.backoff_base_delay_ms.saturating_mul(factor)
            }
        };

        Duration::from_millis(delay_ms.min(self.backoff_max_delay_ms))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Website evidence scanning
#[derive(Debug, Clone, Deserialize)]
pub struct EvidenceConfig {
    pub extra_keywords: Vec<String>,
    pub general_terms: Vec<String>,
    pub target_sections: Vec<String>,
    pub max_sections: usize,
    pub career_terms: Vec<String>,
    pub max_job_pages: usize,
    pub section_delay_ms: DelayRange,
    pub company_delay_ms: DelayRange,
    pub context_chars: usize,
    pub summary_limit: usize,
}

/// Output files and logging
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub directory: String,
    pub csv_encoding: String,
    pub csv_delimiter: String,
    pub log_level: String,
    pub log_file: String,
    pub top_n: usize,
}

impl OutputConfig {
    /// Whether the CSV should start with a UTF-8 byte-order mark
    pub fn write_bom(&self) -> bool {
        self.csv_encoding.eq_ignore_ascii_case("utf-8-sig")
    }

    /// Delimiter as a single byte (validated at load time)
    pub fn delimiter_byte(&self) -> u8 {
        self.csv_delimiter.as_bytes().first().copied().unwrap_or(b',')
    }
}

impl AppConfig {
    /// Resolve configuration the way the binary does: explicit path, then the
    /// standard location, then the embedded defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_from_path(path),
            None => {
                let standard = Path::new(CONFIG_PATH);
                if standard.exists() {
                    Self::load_from_path(standard)
                } else {
                    Self::embedded()
                }
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate the embedded default document
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("sources.directory_base_url", &self.sources.directory_base_url)?;
        validate_url("sources.registry_base_url", &self.sources.registry_base_url)?;

        require_non_empty("search.keywords_cat", &self.search.keywords_cat)?;
        require_non_empty("search.cat_products", &self.search.cat_products)?;
        require_non_empty("search.strong_keywords", &self.search.strong_keywords)?;
        require_non_empty("http.user_agents", &self.http.user_agents)?;

        if self.http.timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.timeout_secs".to_string(),
            });
        }
        if self.http.max_retries == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.max_retries".to_string(),
            });
        }
        if self.http.max_body_bytes == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.max_body_bytes".to_string(),
            });
        }

        let ranges = [
            ("collector.keyword_delay_ms", &self.collector.keyword_delay_ms),
            ("collector.revenue_term_delay_ms", &self.collector.revenue_term_delay_ms),
            ("collector.registry_delay_ms", &self.collector.registry_delay_ms),
            ("collector.strategy_delay_ms", &self.collector.strategy_delay_ms),
            ("http.request_delay_ms", &self.http.request_delay_ms),
            ("evidence.section_delay_ms", &self.evidence.section_delay_ms),
            ("evidence.company_delay_ms", &self.evidence.company_delay_ms),
        ];
        for (field, range) in ranges {
            if range.min_ms > range.max_ms {
                return Err(ConfigError::InvalidDelayRange {
                    field: field.to_string(),
                    min: range.min_ms,
                    max: range.max_ms,
                });
            }
        }

        let encoding = self.output.csv_encoding.to_ascii_lowercase();
        if encoding != "utf-8" && encoding != "utf-8-sig" {
            return Err(ConfigError::UnsupportedEncoding(self.output.csv_encoding.clone()));
        }
        if self.output.csv_delimiter.len() != 1 || !self.output.csv_delimiter.is_ascii() {
            return Err(ConfigError::InvalidDelimiter(self.output.csv_delimiter.clone()));
        }
        if !LOG_LEVELS.contains(&self.output.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.output.log_level.clone()));
        }
        if self.output.directory.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "output.directory".to_string(),
            });
        }

        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        let path = Path::new(CONFIG_PATH);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }
}

fn validate_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl {
            field: field.to_string(),
            url: url.to_string(),
        })
    }
}

fn require_non_empty(field: &str, values: &[String]) -> Result<(), ConfigError> {
    if values.iter().all(|v| v.trim().is_empty()) {
        return Err(ConfigError::EmptyRequired {
            field: field.to_string(),
        });
    }
    Ok(())
}
