//! Service configuration.

use rust_decimal::Decimal;

use emporium_core::config::{env_or, AmqpConfig, OutboxConfig, PostgresConfig, ServerConfig};

/// Seed balance granted to new wallets when nothing is configured.
const DEFAULT_WALLET_BALANCE: i64 = 100_000;

/// Full configuration of the payment service.
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
    /// Seed balance for new wallets.
    pub wallet_default_balance: Decimal,
}

impl Config {
    /// Load from environment variables with service defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let wallet_default_balance = env_or(
            "PAYMENT_WALLET_DEFAULT_BALANCE",
            &DEFAULT_WALLET_BALANCE.to_string(),
        )
        .parse()
        .unwrap_or_else(|_| Decimal::from(DEFAULT_WALLET_BALANCE));
        Self {
            postgres: PostgresConfig::from_env("payment"),
            amqp: AmqpConfig::from_env("payment-events"),
            server: ServerConfig::from_env(8083),
            outbox: OutboxConfig::from_env(),
            wallet_default_balance,
        }
    }
}
