//! Configuration management for MedSearch services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values
//!
//! Every tuning knob the core depends on (cache TTL and capacity, adapter
//! timeouts, context caps) lives here rather than in code.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// Query cache configuration
    pub cache: CacheConfig,

    /// Clinical trials registry adapter configuration
    pub trials: TrialsConfig,

    /// Drug label registry adapter configuration
    pub fda: FdaConfig,

    /// Chat generation backend configuration
    pub generation: GenerationConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Identity provider JWT signing secret
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Entry TTL in seconds; registry data changes slowly
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Maximum number of cached search results (LRU beyond this)
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrialsConfig {
    /// ClinicalTrials.gov API v2 base URL
    #[serde(default = "default_trials_base_url")]
    pub base_url: String,

    /// Records requested per page
    #[serde(default = "default_trials_page_size")]
    pub page_size: usize,

    /// Pagination drain cap; bounds work per fetch
    #[serde(default = "default_trials_max_pages")]
    pub max_pages: usize,

    /// Per-adapter timeout in seconds
    #[serde(default = "default_adapter_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FdaConfig {
    /// openFDA base URL
    #[serde(default = "default_fda_base_url")]
    pub base_url: String,

    /// Records requested per page
    #[serde(default = "default_fda_page_size")]
    pub page_size: usize,

    /// Total record cap across pages; bounds work per fetch
    #[serde(default = "default_fda_max_records")]
    pub max_records: usize,

    /// Per-adapter timeout in seconds
    #[serde(default = "default_adapter_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// API key for the generation backend
    pub api_key: Option<String>,

    /// API base URL (chat-completions compatible)
    #[serde(default = "default_generation_api_base")]
    pub api_base: String,

    /// Model to use
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Maximum records per result set rendered into the context
    #[serde(default = "default_max_context_records")]
    pub max_context_records: usize,

    /// Character budget for long free-text fields in the context
    #[serde(default = "default_max_field_chars")]
    pub max_field_chars: usize,

    /// Most recent history turns kept; older turns dropped first
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_cache_ttl() -> u64 { 600 }
fn default_cache_capacity() -> usize { 500 }
fn default_trials_base_url() -> String { "https://clinicaltrials.gov/api/v2".to_string() }
fn default_trials_page_size() -> usize { 100 }
fn default_trials_max_pages() -> usize { 3 }
fn default_adapter_timeout() -> u64 { 10 }
fn default_fda_base_url() -> String { "https://api.fda.gov".to_string() }
fn default_fda_page_size() -> usize { 100 }
fn default_fda_max_records() -> usize { 300 }
fn default_generation_api_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_generation_model() -> String { "gpt-4o".to_string() }
fn default_generation_timeout() -> u64 { 30 }
fn default_max_context_records() -> usize { 10 }
fn default_max_field_chars() -> usize { 500 }
fn default_max_history_turns() -> usize { 10 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "medsearch".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_rate_limit_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get cache TTL as Duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    /// Get trials adapter timeout as Duration
    pub fn trials_timeout(&self) -> Duration {
        Duration::from_secs(self.trials.timeout_secs)
    }

    /// Get drug label adapter timeout as Duration
    pub fn fda_timeout(&self) -> Duration {
        Duration::from_secs(self.fda.timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
            },
            auth: AuthConfig { jwt_secret: None },
            cache: CacheConfig {
                ttl_secs: default_cache_ttl(),
                capacity: default_cache_capacity(),
            },
            trials: TrialsConfig {
                base_url: default_trials_base_url(),
                page_size: default_trials_page_size(),
                max_pages: default_trials_max_pages(),
                timeout_secs: default_adapter_timeout(),
            },
            fda: FdaConfig {
                base_url: default_fda_base_url(),
                page_size: default_fda_page_size(),
                max_records: default_fda_max_records(),
                timeout_secs: default_adapter_timeout(),
            },
            generation: GenerationConfig {
                api_key: None,
                api_base: default_generation_api_base(),
                model: default_generation_model(),
                timeout_secs: default_generation_timeout(),
                max_context_records: default_max_context_records(),
                max_field_chars: default_max_field_chars(),
                max_history_turns: default_max_history_turns(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                service_name: default_service_name(),
            },
            rate_limit: RateLimitConfig {
                requests_per_second: default_rate_limit(),
                burst: default_burst(),
                enabled: default_rate_limit_enabled(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.ttl_secs, 600);
        assert_eq!(config.cache.capacity, 500);
        assert_eq!(config.trials.timeout_secs, 10);
        assert_eq!(config.generation.max_history_turns, 10);
    }

    #[test]
    fn test_duration_helpers() {
        let config = AppConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(600));
        assert_eq!(config.trials_timeout(), Duration::from_secs(10));
        assert_eq!(config.fda_timeout(), Duration::from_secs(10));
    }
}
