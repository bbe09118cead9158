//! Service configuration.

use emporium_core::config::{AmqpConfig, OutboxConfig, PostgresConfig, ServerConfig};

/// Full configuration of the order service.
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
            postgres: PostgresConfig::from_env("order"),
            amqp: AmqpConfig::from_env("order-events"),
            server: ServerConfig::from_env(8082),
            outbox: OutboxConfig::from_env(),
        }
    }
}
