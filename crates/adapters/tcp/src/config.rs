//! Gateway connection configuration.

use std::time::Duration;

use serde::Deserialize;

use cubelink_domain::error::ValidationError;

/// How to reach the gateway and how long to keep a connection around.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway hostname or IP address.
    pub host: String,
    /// Gateway TCP port.
    pub port: u16,
    /// Keep the connection open between exchanges. Leave off when other
    /// clients share the gateway: it only serves one connection at a time.
    pub exclusive: bool,
    /// Requests served by one connection before it is recycled.
    pub max_requests_per_connection: u32,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Per-line read timeout in seconds.
    pub read_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 62910,
            exclusive: false,
            max_requests_per_connection: 10,
            connect_timeout_secs: 5,
            read_timeout_secs: 3,
        }
    }
}

impl GatewayConfig {
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ValidationError::ZeroPort);
        }
        if self.max_requests_per_connection == 0 {
            return Err(ValidationError::NotPositive("max_requests_per_connection"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ValidationError::NotPositive("connect_timeout_secs"));
        }
        if self.read_timeout_secs == 0 {
            return Err(ValidationError::NotPositive("read_timeout_secs"));
        }
        Ok(())
    }

    /// Return the `host:port` address to connect to.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 62910);
        assert!(!config.exclusive);
        assert_eq!(config.max_requests_per_connection, 10);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.read_timeout(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            host = "192.168.1.40"
            port = 62911
            exclusive = true
            max_requests_per_connection = 25
            connect_timeout_secs = 2
            read_timeout_secs = 7
        "#;
        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.addr(), "192.168.1.40:62911");
        assert!(config.exclusive);
        assert_eq!(config.max_requests_per_connection, 25);
        assert_eq!(config.connect_timeout_secs, 2);
        assert_eq!(config.read_timeout_secs, 7);
    }

    #[test]
    fn should_use_defaults_for_missing_fields() {
        let config: GatewayConfig = toml::from_str(r#"host = "cube.lan""#).unwrap();
        assert_eq!(config.addr(), "cube.lan:62910");
        assert_eq!(config.read_timeout_secs, 3);
    }

    #[test]
    fn should_reject_empty_host() {
        let config = GatewayConfig {
            host: "  ".to_string(),
            ..GatewayConfig::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::EmptyHost));
    }

    #[test]
    fn should_reject_zero_port() {
        let config = GatewayConfig {
            port: 0,
            ..GatewayConfig::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::ZeroPort));
    }

    #[test]
    fn should_reject_zero_request_budget() {
        let config = GatewayConfig {
            max_requests_per_connection: 0,
            ..GatewayConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::NotPositive("max_requests_per_connection"))
        );
    }

    #[test]
    fn should_reject_zero_timeouts() {
        let config = GatewayConfig {
            read_timeout_secs: 0,
            ..GatewayConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
