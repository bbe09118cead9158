//! Service configuration.

use emporium_core::config::{AmqpConfig, OutboxConfig, PostgresConfig, ServerConfig};

/// Full configuration of the product service.
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
            postgres: PostgresConfig::from_env("product"),
            amqp: AmqpConfig::from_env("product-events"),
            server: ServerConfig::from_env(8084),
            outbox: OutboxConfig::from_env(),
        }
    }
}
