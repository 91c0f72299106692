//! Configuration for Stockroom

use crate::StockroomError;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub cache: CacheConfig,
    pub health: HealthConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub listen_addr: String,

    /// Number of Tokio worker threads (0 = number of CPUs)
    pub worker_threads: usize,

    /// Per-request timeout in seconds (0 = no timeout)
    pub request_timeout_secs: u64,

    /// Allowed CORS origins ("*" allows any)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            worker_threads: 0,
            request_timeout_secs: 30,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = StockroomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(StockroomError::Config(format!("unknown environment: {other}"))),
        }
    }
}

/// Service identity reported by `/` and `/health`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub environment: Environment,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "stockroom".to_string(),
            environment: Environment::default(),
        }
    }
}

/// Cache client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// `redis://...`, `memory://`, or unset to run without a cache
    pub url: Option<String>,

    /// Whether a cache outage makes the service unready (vs degraded)
    pub required: bool,

    /// TTL for cached items in seconds
    pub ttl_secs: u64,

    /// Timeout for get/set/delete/exists in milliseconds
    pub op_timeout_ms: u64,

    /// Timeout for the health ping in milliseconds
    pub ping_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: None,
            required: false,
            ttl_secs: 3600,
            op_timeout_ms: 2000,
            ping_timeout_ms: 250,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

/// Readiness aggregation configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Upper bound for a single dependency probe in milliseconds
    pub probe_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 500,
        }
    }
}

impl HealthConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Expose `/metrics`
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Console,
}

impl FromStr for LogFormat {
    type Err = StockroomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "console" | "pretty" | "text" => Ok(Self::Console),
            other => Err(StockroomError::Config(format!("unknown log format: {other}"))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| StockroomError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&contents)
            .map_err(|e| StockroomError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables or use defaults
    pub fn from_env() -> crate::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Apply `STOCKROOM_*` overrides from any key lookup onto the defaults
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("STOCKROOM_LISTEN_ADDR") {
            config.server.listen_addr = addr;
        }
        if let Some(n) = parse_var(&lookup, "STOCKROOM_WORKER_THREADS")? {
            config.server.worker_threads = n;
        }
        if let Some(n) = parse_var(&lookup, "STOCKROOM_REQUEST_TIMEOUT_SECS")? {
            config.server.request_timeout_secs = n;
        }
        if let Some(origins) = lookup("STOCKROOM_CORS_ORIGINS") {
            config.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect();
        }

        if let Some(name) = lookup("STOCKROOM_APP_NAME") {
            config.app.name = name;
        }
        if let Some(env) = lookup("STOCKROOM_ENVIRONMENT") {
            config.app.environment = env.parse()?;
        }

        if let Some(url) = lookup("STOCKROOM_CACHE_URL") {
            let url = url.trim().to_string();
            config.cache.url = (!url.is_empty()).then_some(url);
        }
        if let Some(required) = lookup("STOCKROOM_CACHE_REQUIRED") {
            config.cache.required = parse_bool(&required);
        }
        if let Some(n) = parse_var(&lookup, "STOCKROOM_CACHE_TTL_SECS")? {
            config.cache.ttl_secs = n;
        }
        if let Some(n) = parse_var(&lookup, "STOCKROOM_CACHE_OP_TIMEOUT_MS")? {
            config.cache.op_timeout_ms = n;
        }
        if let Some(n) = parse_var(&lookup, "STOCKROOM_CACHE_PING_TIMEOUT_MS")? {
            config.cache.ping_timeout_ms = n;
        }

        if let Some(n) = parse_var(&lookup, "STOCKROOM_PROBE_TIMEOUT_MS")? {
            config.health.probe_timeout_ms = n;
        }

        if let Some(enabled) = lookup("STOCKROOM_METRICS_ENABLED") {
            config.metrics.enabled = parse_bool(&enabled);
        }

        if let Some(level) = lookup("STOCKROOM_LOG_LEVEL") {
            config.logging.level = level.to_lowercase();
        }
        if let Some(format) = lookup("STOCKROOM_LOG_FORMAT") {
            config.logging.format = format.parse()?;
        }

        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> crate::Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| StockroomError::Config(format!("{key}: invalid value {raw:?}"))),
        None => Ok(None),
    }
}

fn parse_bool(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value == "1"
}
