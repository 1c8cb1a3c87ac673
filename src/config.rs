//! ReplGate Configuration
//!
//! Configuration structures shared by the gateway and router services.
//! Everything here is read once at process start and never changes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::strategy::StrategyKind;

/// Main ReplGate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplGateConfig {
    /// Cluster topology (primary + replicas)
    pub cluster: ClusterConfig,

    /// Database credentials and timeouts
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Router (internal proxy) configuration
    #[serde(default)]
    pub router: RouterConfig,

    /// Gateway (public entry point) configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cluster topology configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Writable primary host
    pub primary: String,

    /// Read-only replica hosts, in order
    #[serde(default)]
    pub replicas: Vec<String>,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Port the database listens on (same for every host)
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Database user
    #[serde(default)]
    pub user: String,

    /// Database password
    #[serde(default)]
    pub password: String,

    /// Default schema (optional)
    #[serde(default)]
    pub database: Option<String>,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Statement read/write timeout in seconds
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_secs: u64,
}

/// Router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// HTTP bind address
    #[serde(default = "default_router_address")]
    pub bind_address: String,

    /// Strategy installed when none has been chosen yet
    #[serde(default = "default_strategy")]
    pub default_strategy: String,

    /// How long a latency-probed decision stays valid, in milliseconds
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Per-replica TCP connect timeout for latency probes, in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP bind address
    #[serde(default = "default_gateway_address")]
    pub bind_address: String,

    /// Shared secret expected in the X-API-Key header
    #[serde(default)]
    pub api_key: String,

    /// Base URL of the router service
    #[serde(default = "default_router_url")]
    pub router_url: String,

    /// Timeout for forwarded queries, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for best-effort strategy changes, in seconds
    #[serde(default = "default_strategy_timeout")]
    pub strategy_timeout_secs: u64,

    /// Maximum accepted query length in characters
    #[serde(default = "default_max_query_length")]
    pub max_query_length: usize,

    /// Regex blocklist replacing the built-in one
    #[serde(default)]
    pub blocked_patterns: Option<Vec<String>>,

    /// Enable permissive CORS
    #[serde(default)]
    pub cors_enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_db_port() -> u16 {
    3306
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_statement_timeout() -> u64 {
    30
}

fn default_router_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_strategy() -> String {
    StrategyKind::DirectHit.to_string()
}

fn default_cache_ttl_ms() -> u64 {
    5000
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_gateway_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_router_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_strategy_timeout() -> u64 {
    10
}

fn default_max_query_length() -> usize {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            port: default_db_port(),
            user: String::new(),
            password: String::new(),
            database: None,
            connect_timeout_secs: default_connect_timeout(),
            statement_timeout_secs: default_statement_timeout(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            bind_address: default_router_address(),
            default_strategy: default_strategy(),
            cache_ttl_ms: default_cache_ttl_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: default_gateway_address(),
            api_key: String::new(),
            router_url: default_router_url(),
            request_timeout_secs: default_request_timeout(),
            strategy_timeout_secs: default_strategy_timeout(),
            max_query_length: default_max_query_length(),
            blocked_patterns: None,
            cors_enabled: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ReplGateConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: ReplGateConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the parts of the configuration both services need
    pub fn validate(&self) -> crate::Result<()> {
        if self.cluster.primary.trim().is_empty() {
            return Err(crate::Error::Config("cluster.primary cannot be empty".into()));
        }

        if self.cluster.replicas.iter().any(|r| r.trim().is_empty()) {
            return Err(crate::Error::Config("cluster.replicas cannot contain empty hosts".into()));
        }

        self.router
            .default_strategy
            .parse::<StrategyKind>()
            .map_err(|e| crate::Error::Config(format!("router.default_strategy: {}", e)))?;

        if self.gateway.max_query_length == 0 {
            return Err(crate::Error::Config("gateway.max_query_length must be positive".into()));
        }

        let timeouts = [
            ("database.connect_timeout_secs", self.database.connect_timeout_secs),
            ("database.statement_timeout_secs", self.database.statement_timeout_secs),
            ("router.probe_timeout_ms", self.router.probe_timeout_ms),
            ("gateway.request_timeout_secs", self.gateway.request_timeout_secs),
            ("gateway.strategy_timeout_secs", self.gateway.strategy_timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
            return Err(crate::Error::Config(format!("{} must be positive", name)));
        }

        Ok(())
    }

    /// Extra checks needed only when running the gateway
    pub fn validate_gateway(&self) -> crate::Result<()> {
        if self.gateway.api_key.is_empty() {
            return Err(crate::Error::Config("gateway.api_key cannot be empty".into()));
        }

        if self.gateway.router_url.is_empty() {
            return Err(crate::Error::Config("gateway.router_url cannot be empty".into()));
        }

        crate::gateway::QueryValidator::from_config(&self.gateway)?;

        Ok(())
    }

    /// Strategy installed on first use
    pub fn default_strategy(&self) -> StrategyKind {
        self.router
            .default_strategy
            .parse()
            .unwrap_or(StrategyKind::DirectHit)
    }

    /// Get the latency cache TTL as Duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.router.cache_ttl_ms)
    }

    /// Get the probe timeout as Duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.router.probe_timeout_ms)
    }

    /// Get the forwarded query timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway.request_timeout_secs)
    }

    /// Get the strategy change timeout as Duration
    pub fn strategy_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway.strategy_timeout_secs)
    }
}
