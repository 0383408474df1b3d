//! Configuration for the controller

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main controller configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Requeue and backoff configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Incident backend client configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Teardown configuration
    #[serde(default)]
    pub teardown: TeardownConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Requeue and backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// First backoff delay in milliseconds
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Upper bound on the backoff delay in seconds
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,

    /// Fixed requeue delay while credentials cannot be loaded
    #[serde(default = "default_credentials_retry")]
    pub credentials_retry_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_secs: 300,
            credentials_retry_secs: 600,
        }
    }
}

/// Incident backend client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Deadline for a single backend call in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Teardown configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeardownConfig {
    /// Resolve open incidents before deleting a service
    #[serde(default)]
    pub drain_incidents: bool,

    /// Poll attempts before giving up on open incidents
    #[serde(default = "default_drain_attempts")]
    pub drain_max_attempts: u32,

    /// Delay between polls in milliseconds
    #[serde(default = "default_drain_delay")]
    pub drain_delay_ms: u64,
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            drain_incidents: false,
            drain_max_attempts: 5,
            drain_delay_ms: 2000,
        }
    }
}

impl TeardownConfig {
    pub fn drain_delay(&self) -> Duration {
        Duration::from_millis(self.drain_delay_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// Default value helpers
fn default_base_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    300
}

fn default_credentials_retry() -> u64 {
    600
}

fn default_request_timeout() -> u64 {
    30
}

fn default_drain_attempts() -> u32 {
    5
}

fn default_drain_delay() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ControllerConfig {
    /// Load configuration: defaults, then an optional file, then `PDO_`
    /// environment variables (`PDO_RETRY__MAX_DELAY_SECS=60`)
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&ControllerConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PDO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
