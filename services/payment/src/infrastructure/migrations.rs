//! Numbered schema migrations for the payment database.

use emporium_postgres::migrate::Migration;
use emporium_postgres::outbox::OUTBOX_MIGRATION;
use emporium_postgres::runs::WORKFLOW_RUNS_MIGRATION;

const PAYMENTS: &str = r"
CREATE TABLE IF NOT EXISTS payments (
    payment_id uuid PRIMARY KEY,
    wallet_id uuid NOT NULL,
    order_id uuid NOT NULL,
    amount numeric(18, 4) NOT NULL CHECK (amount >= 0),
    status integer NOT NULL,
    created_at timestamptz NOT NULL,
    updated_at timestamptz NOT NULL,
    deleted_at timestamptz
);
CREATE INDEX IF NOT EXISTS payments_order_idx ON payments (order_id);
";

const WALLETS: &str = r"
CREATE TABLE IF NOT EXISTS wallets (
    wallet_id uuid PRIMARY KEY,
    user_id uuid NOT NULL,
    balance numeric(18, 4) NOT NULL CHECK (balance >= 0),
    created_at timestamptz NOT NULL,
    updated_at timestamptz NOT NULL,
    deleted_at timestamptz
);
CREATE UNIQUE INDEX IF NOT EXISTS wallets_user_idx ON wallets (user_id);
";

/// All migrations in version order.
#[must_use]
pub fn migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "payments",
            sql: PAYMENTS,
        },
        Migration {
            version: 2,
            name: "wallets",
            sql: WALLETS,
        },
        Migration {
            version: 3,
            name: "outbox",
            sql: OUTBOX_MIGRATION,
        },
        Migration {
            version: 4,
            name: "workflow_runs",
            sql: WORKFLOW_RUNS_MIGRATION,
        },
    ]
}
