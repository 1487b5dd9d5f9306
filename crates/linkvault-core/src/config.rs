//! Configuration module for LinkVault.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for LinkVault.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub origin: OriginConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Where intercepted requests are forwarded to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Base URL of the application origin, e.g. `http://127.0.0.1:5173`.
    pub base_url: String,
}

/// Background sync / retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between periodic drain cycles.
    pub poll_interval: u64,
    /// Base retry delay and throttle between successful deliveries (ms).
    pub min_delay_ms: u64,
    /// Upper bound for any computed or server-requested delay (ms).
    pub max_delay_ms: u64,
    /// Delay used when a 429 carries no usable `Retry-After` (ms).
    pub default_rate_limit_delay_ms: u64,
    /// Timeout of a single delivery attempt (seconds).
    pub request_timeout: u64,
    /// Consecutive failures after which an entry is dropped.
    pub max_consecutive_failures: u32,
    /// Maximum age of a queued entry (hours).
    pub retention_hours: u64,
    /// Path of the metadata endpoint on the origin.
    pub metadata_path: String,
}

/// HTTP cache tier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Path to the build manifest JSON (`{version?, assets[]}`).
    pub manifest: PathBuf,
    /// Maximum number of entries kept in the runtime cache.
    pub runtime_max_entries: usize,
    /// Entries older than this (by `Date` header) are expired.
    pub max_age_days: u32,
    /// Application routes pre-fetched into the runtime cache at install.
    pub essential_routes: Vec<String>,
    /// Route whose cached response serves as the offline shell.
    pub shell_route: String,
    /// Requests under this path prefix are network-only.
    pub api_prefix: String,
}

/// Local interception proxy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the proxy listens on.
    pub listen: String,
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file.
    pub path: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/linkvault/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("linkvault")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5173".to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: 60,
            min_delay_ms: 15_000,
            max_delay_ms: 300_000,
            default_rate_limit_delay_ms: 60_000,
            request_timeout: 40,
            max_consecutive_failures: 5,
            retention_hours: 24,
            metadata_path: "/api/fetch-metadata".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn retention(&self) -> chrono::Duration {
        // Clamped to a century so the conversion cannot overflow.
        chrono::Duration::hours(self.retention_hours.min(876_000) as i64)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("build/manifest.json"),
            runtime_max_entries: 50,
            max_age_days: 7,
            essential_routes: vec!["/".to_string()],
            shell_route: "/".to_string(),
            api_prefix: "/api/".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.max_age_days))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8787".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("linkvault")
                .join("linkvault.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.poll_interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

fn absolute_path(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if !value.starts_with('/') {
        errors.push(ValidationError {
            field: field.into(),
            message: format!("must start with '/': {value}"),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- origin ---
        match Url::parse(&self.origin.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(ValidationError {
                field: "origin.base_url".into(),
                message: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError {
                field: "origin.base_url".into(),
                message: format!("invalid URL '{}': {e}", self.origin.base_url),
            }),
        }

        // --- sync ---
        positive(&mut errors, "sync.poll_interval", self.sync.poll_interval);
        positive(&mut errors, "sync.min_delay_ms", self.sync.min_delay_ms);
        positive(&mut errors, "sync.max_delay_ms", self.sync.max_delay_ms);
        positive(
            &mut errors,
            "sync.default_rate_limit_delay_ms",
            self.sync.default_rate_limit_delay_ms,
        );
        positive(&mut errors, "sync.request_timeout", self.sync.request_timeout);
        positive(
            &mut errors,
            "sync.max_consecutive_failures",
            u64::from(self.sync.max_consecutive_failures),
        );
        positive(&mut errors, "sync.retention_hours", self.sync.retention_hours);
        if self.sync.min_delay_ms > self.sync.max_delay_ms {
            errors.push(ValidationError {
                field: "sync.min_delay_ms".into(),
                message: format!(
                    "min_delay_ms ({}) must not exceed max_delay_ms ({})",
                    self.sync.min_delay_ms, self.sync.max_delay_ms
                ),
            });
        }
        absolute_path(&mut errors, "sync.metadata_path", &self.sync.metadata_path);

        // --- cache ---
        positive(
            &mut errors,
            "cache.runtime_max_entries",
            self.cache.runtime_max_entries as u64,
        );
        positive(&mut errors, "cache.max_age_days", u64::from(self.cache.max_age_days));
        absolute_path(&mut errors, "cache.api_prefix", &self.cache.api_prefix);
        absolute_path(&mut errors, "cache.shell_route", &self.cache.shell_route);
        for (i, route) in self.cache.essential_routes.iter().enumerate() {
            absolute_path(&mut errors, &format!("cache.essential_routes[{i}]"), route);
        }

        // --- server ---
        if self.server.listen.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError {
                field: "server.listen".into(),
                message: format!("not a socket address: {}", self.server.listen),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use linkvault_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .origin_base_url("http://127.0.0.1:3000")
///     .sync_poll_interval(30)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn origin_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.origin.base_url = url.into();
        self
    }

    // --- sync ---

    pub fn sync_poll_interval(mut self, seconds: u64) -> Self {
        self.config.sync.poll_interval = seconds;
        self
    }

    pub fn sync_min_delay_ms(mut self, ms: u64) -> Self {
        self.config.sync.min_delay_ms = ms;
        self
    }

    pub fn sync_max_delay_ms(mut self, ms: u64) -> Self {
        self.config.sync.max_delay_ms = ms;
        self
    }

    pub fn sync_request_timeout(mut self, seconds: u64) -> Self {
        self.config.sync.request_timeout = seconds;
        self
    }

    pub fn sync_max_consecutive_failures(mut self, n: u32) -> Self {
        self.config.sync.max_consecutive_failures = n;
        self
    }

    pub fn sync_retention_hours(mut self, hours: u64) -> Self {
        self.config.sync.retention_hours = hours;
        self
    }

    pub fn sync_metadata_path(mut self, path: impl Into<String>) -> Self {
        self.config.sync.metadata_path = path.into();
        self
    }

    // --- cache ---

    pub fn cache_manifest(mut self, path: PathBuf) -> Self {
        self.config.cache.manifest = path;
        self
    }

    pub fn cache_runtime_max_entries(mut self, n: usize) -> Self {
        self.config.cache.runtime_max_entries = n;
        self
    }

    pub fn cache_max_age_days(mut self, days: u32) -> Self {
        self.config.cache.max_age_days = days;
        self
    }

    pub fn cache_essential_routes(mut self, routes: Vec<String>) -> Self {
        self.config.cache.essential_routes = routes;
        self
    }

    pub fn cache_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.cache.api_prefix = prefix.into();
        self
    }

    // --- server / database / logging ---

    pub fn server_listen(mut self, addr: impl Into<String>) -> Self {
        self.config.server.listen = addr.into();
        self
    }

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.database.path = path;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
