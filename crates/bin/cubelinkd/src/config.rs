//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `cubelink.toml` in the working directory, or the file named by
//! `CUBELINK_CONFIG`. Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::time::Duration;

use cubelink_adapter_tcp::GatewayConfig;
use cubelink_app::coordinator::CoordinatorConfig;
use cubelink_domain::error::ValidationError;
use serde::Deserialize;

const DEFAULT_PATH: &str = "cubelink.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gateway connection settings.
    pub gateway: GatewayConfig,
    /// Polling cadence and outbox sizing.
    pub coordinator: CoordinatorSection,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// `[coordinator]` table.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CoordinatorSection {
    /// Seconds between two polls.
    pub poll_interval_secs: u64,
    /// Milliseconds between two command sends.
    pub command_interval_millis: u64,
    /// Maximum number of queued commands.
    pub outbox_capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from the config file (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting values are invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CUBELINK_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("CUBELINK_HOST") {
            self.gateway.host = val;
        }
        if let Some(port) = lookup("CUBELINK_PORT").and_then(|val| val.parse().ok()) {
            self.gateway.port = port;
        }
        if let Some(val) = lookup("CUBELINK_GATEWAY") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.gateway.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.gateway.port = port;
                }
            }
        }
        if let Some(exclusive) = lookup("CUBELINK_EXCLUSIVE").and_then(|val| parse_flag(&val)) {
            self.gateway.exclusive = exclusive;
        }
        if let Some(val) = lookup("CUBELINK_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.gateway.validate()?;
        self.coordinator_config().validate()?;
        Ok(())
    }

    /// Coordinator settings with the units the coordinator works in.
    #[must_use]
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            poll_interval: Duration::from_secs(self.coordinator.poll_interval_secs),
            command_interval: Duration::from_millis(self.coordinator.command_interval_millis),
            outbox_capacity: self.coordinator.outbox_capacity,
        }
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            command_interval_millis: 1000,
            outbox_capacity: 50,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "cubelinkd=info,cubelink_app=info,cubelink_adapter_tcp=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration")]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.gateway.port, 62910);
        assert!(!config.gateway.exclusive);
        assert_eq!(config.coordinator.poll_interval_secs, 30);
        assert_eq!(config.coordinator.command_interval_millis, 1000);
        assert_eq!(config.coordinator.outbox_capacity, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.gateway.port, 62910);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [gateway]
            host = '192.168.1.40'
            port = 62911
            exclusive = true
            max_requests_per_connection = 5

            [coordinator]
            poll_interval_secs = 10
            command_interval_millis = 250
            outbox_capacity = 20

            [logging]
            filter = 'debug'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.gateway.addr(), "192.168.1.40:62911");
        assert!(config.gateway.exclusive);
        assert_eq!(config.gateway.max_requests_per_connection, 5);
        assert_eq!(config.logging.filter, "debug");

        let coordinator = config.coordinator_config();
        assert_eq!(coordinator.poll_interval, Duration::from_secs(10));
        assert_eq!(coordinator.command_interval, Duration::from_millis(250));
        assert_eq!(coordinator.outbox_capacity, 20);
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [gateway]
            host = 'cube.lan'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.gateway.host, "cube.lan");
        assert_eq!(config.gateway.read_timeout_secs, 3);
        assert_eq!(config.coordinator.outbox_capacity, 50);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.gateway.port, 62910);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_apply_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(overrides(&[
            ("CUBELINK_HOST", "10.0.0.2"),
            ("CUBELINK_PORT", "1234"),
            ("CUBELINK_EXCLUSIVE", "true"),
            ("CUBELINK_LOG", "trace"),
        ]));
        assert_eq!(config.gateway.addr(), "10.0.0.2:1234");
        assert!(config.gateway.exclusive);
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_let_gateway_override_host_and_port() {
        let mut config = Config::default();
        config.apply_overrides(overrides(&[
            ("CUBELINK_HOST", "ignored"),
            ("CUBELINK_GATEWAY", "cube.lan:62999"),
        ]));
        assert_eq!(config.gateway.addr(), "cube.lan:62999");
    }

    #[test]
    fn should_prefer_rust_log_over_cubelink_log() {
        let mut config = Config::default();
        config.apply_overrides(overrides(&[("CUBELINK_LOG", "warn"), ("RUST_LOG", "debug")]));
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_ignore_unparseable_overrides() {
        let mut config = Config::default();
        config.apply_overrides(overrides(&[
            ("CUBELINK_PORT", "not-a-port"),
            ("CUBELINK_EXCLUSIVE", "maybe"),
        ]));
        assert_eq!(config.gateway.port, 62910);
        assert!(!config.gateway.exclusive);
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.gateway.port = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(ValidationError::ZeroPort))
        ));
    }

    #[test]
    fn should_reject_zero_poll_interval() {
        let mut config = Config::default();
        config.coordinator.poll_interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(ValidationError::NotPositive(_)))
        ));
    }
}
