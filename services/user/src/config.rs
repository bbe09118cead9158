//! Service configuration.

use emporium_core::config::{AmqpConfig, OutboxConfig, PostgresConfig, ServerConfig};

/// Full configuration of the user service.
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
            postgres: PostgresConfig::from_env("user"),
            amqp: AmqpConfig::from_env("user-events"),
            server: ServerConfig::from_env(8081),
            outbox: OutboxConfig::from_env(),
        }
    }
}
