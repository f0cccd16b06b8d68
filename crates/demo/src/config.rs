//! Demo configuration loaded from environment variables.

use std::time::Duration;

use event_bus::RabbitMqConfig;
use event_bus::transport::rabbitmq::{DEFAULT_EXCHANGE, DEFAULT_VHOST};

const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:2112";
const DEFAULT_RUN_INTERVAL: Duration = Duration::from_secs(10);

/// Demo configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `RABBITMQ_HTTP_URL`: management API base URL. Unset or empty keeps
///   events in-process only.
/// - `RABBITMQ_USERNAME`, `RABBITMQ_PASSWORD`: basic-auth credentials.
/// - `RABBITMQ_VHOST` (default: `"/"`), `RABBITMQ_EXCHANGE` (default:
///   `"saga.events"`).
/// - `METRICS_ADDR`: bind address for `/metrics` and `/healthz` (default:
///   `"0.0.0.0:2112"`). A bare `":port"` binds every interface.
/// - `RUN_CONTINUOUS`: `"true"` repeats the scenarios until shutdown.
/// - `RUN_INTERVAL_SECS`: pause between repetitions (default: `10`).
/// - `RUST_LOG`: tracing filter directive (default: `"info"`).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub rabbitmq_url: Option<String>,
    pub rabbitmq_username: Option<String>,
    pub rabbitmq_password: Option<String>,
    pub rabbitmq_vhost: String,
    pub rabbitmq_exchange: String,
    pub metrics_addr: String,
    pub run_continuous: bool,
    pub run_interval: Duration,
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Self {
            rabbitmq_url: non_empty("RABBITMQ_HTTP_URL"),
            rabbitmq_username: non_empty("RABBITMQ_USERNAME"),
            rabbitmq_password: lookup("RABBITMQ_PASSWORD"),
            rabbitmq_vhost: non_empty("RABBITMQ_VHOST").unwrap_or(defaults.rabbitmq_vhost),
            rabbitmq_exchange: non_empty("RABBITMQ_EXCHANGE")
                .unwrap_or(defaults.rabbitmq_exchange),
            metrics_addr: non_empty("METRICS_ADDR").unwrap_or(defaults.metrics_addr),
            run_continuous: lookup("RUN_CONTINUOUS").as_deref() == Some("true"),
            run_interval: non_empty("RUN_INTERVAL_SECS")
                .and_then(|secs| secs.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.run_interval),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Returns the bind address for the metrics server.
    pub fn metrics_addr(&self) -> String {
        match self.metrics_addr.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.metrics_addr.clone(),
        }
    }

    /// Returns the broker settings, or `None` when no broker is configured.
    pub fn rabbitmq(&self) -> Option<RabbitMqConfig> {
        let endpoint = self.rabbitmq_url.as_ref()?;
        let mut config = RabbitMqConfig::new(endpoint.as_str())
            .with_vhost(self.rabbitmq_vhost.as_str())
            .with_exchange(self.rabbitmq_exchange.as_str());
        if let Some(username) = &self.rabbitmq_username {
            config = config.with_credentials(
                username.as_str(),
                self.rabbitmq_password.clone().unwrap_or_default(),
            );
        }
        Some(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rabbitmq_url: None,
            rabbitmq_username: None,
            rabbitmq_password: None,
            rabbitmq_vhost: DEFAULT_VHOST.to_string(),
            rabbitmq_exchange: DEFAULT_EXCHANGE.to_string(),
            metrics_addr: DEFAULT_METRICS_ADDR.to_string(),
            run_continuous: false,
            run_interval: DEFAULT_RUN_INTERVAL,
            log_level: "info".to_string(),
        }
    }
}
