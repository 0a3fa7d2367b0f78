//! Metadata source connection configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for database-backed metadata sources.
///
/// # Security
/// Credentials are never stored here; they stay in the connection URL,
/// which is redacted before it is logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Maximum number of connections in pool
    pub max_connections: u32,
    /// Whether to open the database read-only
    pub read_only: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            max_connections: 1,
            read_only: true,
        }
    }
}

impl ConnectionConfig {
    /// Validates connection configuration parameters.
    ///
    /// # Errors
    /// Returns error if configuration values are invalid or unsafe
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_connections == 0 {
            return Err(crate::error::CrawlError::configuration(
                "max_connections must be greater than 0",
            ));
        }

        if self.max_connections > 100 {
            return Err(crate::error::CrawlError::configuration(
                "max_connections should not exceed 100 for safety",
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(crate::error::CrawlError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Builder method to set the pool size.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Builder method to allow writes (used when seeding test databases).
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_default() {
        let config = ConnectionConfig::default();
        assert_eq!(config.max_connections, 1);
        assert!(config.read_only);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_connection_config_validation() {
        assert!(ConnectionConfig::default().with_max_connections(0).validate().is_err());
        assert!(ConnectionConfig::default().with_max_connections(101).validate().is_err());

        let config = ConnectionConfig {
            connect_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
