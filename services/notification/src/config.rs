//! Service configuration.

use emporium_core::config::{AmqpConfig, OutboxConfig, PostgresConfig, ServerConfig};

/// Full configuration of the notification service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database settings.
    pub postgres: PostgresConfig,
    /// Broker settings.
    pub amqp: AmqpConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Outbox relay settings.
    pub outbox: OutboxConfig,
}

impl Config {
    /// Load from environment variables with service defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            postgres: PostgresConfig::from_env("notification"),
            amqp: AmqpConfig::from_env("notification-events"),
            server: ServerConfig::from_env(8085),
            outbox: OutboxConfig::from_env(),
        }
    }
}
