//! Configuration management for CiteForge
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/<APP_ENV>.toml, config/local.toml)
//! - Default values

use crate::errors::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct AppConfig {
    /// Catalog service configuration
    #[serde(default)]
    #[validate(nested)]
    pub catalog: CatalogConfig,

    /// Retry and rate tuning for the request executor
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig,

    /// Crawl budgets and pagination
    #[serde(default)]
    #[validate(nested)]
    pub crawl: CrawlConfig,

    /// Graph assembly and flat-file schema
    #[serde(default)]
    pub graph: GraphConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CatalogConfig {
    /// Base URL of the catalog API
    #[serde(default = "default_base_url")]
    #[validate(url)]
    pub base_url: String,

    /// Contact email sent as the `mailto` courtesy parameter
    #[validate(email)]
    pub mailto: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RetryConfig {
    /// Attempts per request (including the first)
    #[serde(default = "default_retries")]
    #[validate(range(min = 1, max = 32))]
    pub retries: u32,

    /// Initial backoff in seconds
    #[serde(default = "default_backoff")]
    #[validate(range(min = 0.0, max = 3600.0))]
    pub backoff_secs: f64,

    /// Fixed delay before every attempt, in seconds
    #[serde(default)]
    #[validate(range(min = 0.0, max = 3600.0))]
    pub rate_interval_secs: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CrawlConfig {
    /// Page size of the preliminary count call
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 200))]
    pub page_size: u32,

    /// Cap on entities returned by bulk retrieval (None disables the cap)
    #[serde(default = "default_max_entities")]
    pub max_entities: Option<usize>,

    /// Result counts above this use cursor pagination
    #[serde(default = "default_offset_ceiling")]
    #[validate(range(min = 1))]
    pub offset_ceiling: usize,

    /// BFS depth limit (seeds are depth 0)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// BFS processed-node budget (None disables the budget)
    #[serde(default = "default_max_nodes")]
    pub max_nodes: Option<usize>,
}

/// What graph assembly does when a work identifier repeats in the stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Later occurrence takes over the identifier mapping
    #[default]
    Overwrite,
    /// Fail the assembly
    Reject,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphConfig {
    /// Work attributes kept on graph nodes, in column order
    #[serde(default = "default_keep_attributes")]
    pub keep_attributes: Vec<String>,

    /// Attributes decoded as integers when reading flat files
    #[serde(default = "default_integer_attributes")]
    pub integer_attributes: Vec<String>,

    /// Attributes decoded as floats when reading flat files
    #[serde(default)]
    pub float_attributes: Vec<String>,

    /// Attributes decoded as booleans when reading flat files
    #[serde(default = "default_boolean_attributes")]
    pub boolean_attributes: Vec<String>,

    /// Attributes holding JSON structures
    #[serde(default = "default_structured_attributes")]
    pub structured_attributes: Vec<String>,

    /// Handling of repeated work identifiers
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,

    /// Service name attached to the startup log line
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_base_url() -> String { "https://api.openalex.org".to_string() }
fn default_request_timeout() -> u64 { 30 }
fn default_user_agent() -> String { format!("citeforge/{}", crate::VERSION) }
fn default_retries() -> u32 { 3 }
fn default_backoff() -> f64 { 2.0 }
fn default_page_size() -> u32 { crate::MAX_PAGE_SIZE }
fn default_max_entities() -> Option<usize> { Some(10_000) }
fn default_offset_ceiling() -> usize { crate::OFFSET_PAGINATION_CEILING }
fn default_max_depth() -> usize { 10 }
fn default_max_nodes() -> Option<usize> { Some(10_000) }
fn default_log_level() -> String { "info".to_string() }
fn default_service_name() -> String { "citeforge".to_string() }

fn default_keep_attributes() -> Vec<String> {
    [
        "id",
        "doi",
        "title",
        "publication_year",
        "publication_date",
        "language",
        "is_oa",
        "authorships",
        "primary_topic",
        "abstract_inverted_index",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_integer_attributes() -> Vec<String> { vec!["publication_year".to_string()] }
fn default_boolean_attributes() -> Vec<String> { vec!["is_oa".to_string()] }

fn default_structured_attributes() -> Vec<String> {
    ["authorships", "primary_topic", "abstract_inverted_index"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            mailto: None,
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            backoff_secs: default_backoff(),
            rate_interval_secs: 0.0,
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_entities: default_max_entities(),
            offset_ceiling: default_offset_ceiling(),
            max_depth: default_max_depth(),
            max_nodes: default_max_nodes(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            keep_attributes: default_keep_attributes(),
            integer_attributes: default_integer_attributes(),
            float_attributes: Vec::new(),
            boolean_attributes: default_boolean_attributes(),
            structured_attributes: default_structured_attributes(),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
            service_name: default_service_name(),
        }
    }
}

fn env_source() -> Environment {
    // e.g., APP__RETRY__BACKOFF_SECS=1.5
    Environment::with_prefix("APP")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("graph.keep_attributes")
        .with_list_parse_key("graph.integer_attributes")
        .with_list_parse_key("graph.float_attributes")
        .with_list_parse_key("graph.boolean_attributes")
        .with_list_parse_key("graph.structured_attributes")
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(env_source())
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.check()

    }

    /// Load from a specific file, still honoring APP__ overrides
    pub fn from_file(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.check()

    }
}

impl AppConfig {
    /// Validate ranges, including values the range rules let through (NaN)
    fn check(self) -> Result<Self> {
        self.validate()?;
        self.retry.backoff()?;
        self.retry.rate_interval()?;
        Ok(self)
    }
}

impl CatalogConfig {
    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl RetryConfig {
    /// Initial backoff as Duration
    pub fn backoff(&self) -> Result<Duration> {
        seconds("retry.backoff_secs", self.backoff_secs)
    }

    /// Pre-attempt delay as Duration
    pub fn rate_interval(&self) -> Result<Duration> {
        seconds("retry.rate_interval_secs", self.rate_interval_secs)
    }
}

fn seconds(key: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|e| AppError::Configuration {
        message: format!("{} = {}: {}", key, secs, e),
    })
}
