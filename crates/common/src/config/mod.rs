//! Configuration management for Provato services
//!
//! Supports loading configuration from:
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Environment variables (prefixed with APP__)
//! - The legacy variable names (NEO4J_URI, OPENAI_API_KEY, ...)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Graph database connection
    #[serde(default)]
    pub graph: GraphConfig,

    /// Hosted language model
    #[serde(default)]
    pub llm: LlmConfig,

    /// Retrieval limits
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Conversation history storage
    #[serde(default)]
    pub session: SessionConfig,

    /// Bulk loaders
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
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
pub struct GraphConfig {
    /// Bolt URI
    #[serde(default = "default_graph_uri")]
    pub uri: String,

    #[serde(default = "default_graph_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Target database name
    #[serde(default = "default_graph_database")]
    pub database: String,

    /// Connection pool size
    #[serde(default = "default_graph_max_connections")]
    pub max_connections: usize,

    /// Rows pulled per round trip
    #[serde(default = "default_graph_fetch_size")]
    pub fetch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Completion provider: openai, mock
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API key for the completion service
    pub api_key: Option<String>,

    /// API base URL
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model to use
    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    #[serde(default = "default_expand_top_k")]
    pub expand_top_k: usize,

    #[serde(default = "default_expand_neighbor_limit")]
    pub expand_neighbor_limit: usize,

    #[serde(default = "default_lookup_limit")]
    pub lookup_limit: usize,

    #[serde(default = "default_lookup_neighbor_limit")]
    pub lookup_neighbor_limit: usize,

    #[serde(default = "default_generated_row_limit")]
    pub generated_row_limit: usize,

    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,

    /// History turns included in the answer prompt
    #[serde(default = "default_prompt_history")]
    pub prompt_history: usize,

    /// History entries kept between turns
    #[serde(default = "default_stored_history")]
    pub stored_history: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Redis URL; in-memory history when absent
    pub redis_url: Option<String>,

    /// History TTL in seconds
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// Key prefix for namespacing
    #[serde(default = "default_session_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Rows per write transaction
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 60 }
fn default_graph_uri() -> String { "bolt://localhost:7687".to_string() }
fn default_graph_user() -> String { "neo4j".to_string() }
fn default_graph_database() -> String { "neo4j".to_string() }
fn default_graph_max_connections() -> usize { 16 }
fn default_graph_fetch_size() -> usize { 200 }
fn default_llm_provider() -> String { "openai".to_string() }
fn default_llm_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_llm_temperature() -> f32 { 0.2 }
fn default_llm_timeout() -> u64 { 30 }
fn default_search_limit() -> usize { 20 }
fn default_expand_top_k() -> usize { 5 }
fn default_expand_neighbor_limit() -> usize { 15 }
fn default_lookup_limit() -> usize { 5 }
fn default_lookup_neighbor_limit() -> usize { 20 }
fn default_generated_row_limit() -> usize { 100 }
fn default_suggestion_limit() -> usize { 10 }
fn default_prompt_history() -> usize { 8 }
fn default_stored_history() -> usize { 10 }
fn default_session_ttl() -> u64 { 3600 }
fn default_session_prefix() -> String { "provato".to_string() }
fn default_batch_size() -> usize { 500 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "provato".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: default_graph_uri(),
            user: default_graph_user(),
            password: String::new(),
            database: default_graph_database(),
            max_connections: default_graph_max_connections(),
            fetch_size: default_graph_fetch_size(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
            expand_top_k: default_expand_top_k(),
            expand_neighbor_limit: default_expand_neighbor_limit(),
            lookup_limit: default_lookup_limit(),
            lookup_neighbor_limit: default_lookup_neighbor_limit(),
            generated_row_limit: default_generated_row_limit(),
            suggestion_limit: default_suggestion_limit(),
            prompt_history: default_prompt_history(),
            stored_history: default_stored_history(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_secs: default_session_ttl(),
            key_prefix: default_session_prefix(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

/// Legacy variable names and the keys they override
const LEGACY_ENV: &[(&str, &str)] = &[
    ("NEO4J_URI", "graph.uri"),
    ("NEO4J_USER", "graph.user"),
    ("NEO4J_PASS", "graph.password"),
    ("NEO4J_DATABASE", "graph.database"),
    ("OPENAI_API_KEY", "llm.api_key"),
    ("OPENAI_BASE_URL", "llm.base_url"),
    ("OPENAI_MODEL", "llm.model"),
    ("REDIS_URL", "session.redis_url"),
];

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let mut builder = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__GRAPH__URI=bolt://db:7687
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in LEGACY_ENV {
            let value = std::env::var(var).ok().filter(|v| !v.is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        builder.build()?.try_deserialize()
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

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.retrieval.search_limit, 20);
        assert_eq!(config.retrieval.expand_neighbor_limit, 15);
        assert_eq!(config.retrieval.lookup_neighbor_limit, 20);
        assert_eq!(config.retrieval.suggestion_limit, 10);
        assert_eq!(config.ingestion.batch_size, 500);
        assert!(config.session.redis_url.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[graph]\nuri = \"bolt://graph:7687\"\n\n[retrieval]\nexpand_top_k = 3").unwrap();

        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.graph.uri, "bolt://graph:7687");
        assert_eq!(config.graph.user, "neo4j");
        assert_eq!(config.retrieval.expand_top_k, 3);
        assert_eq!(config.retrieval.lookup_limit, 5);
    }
}
