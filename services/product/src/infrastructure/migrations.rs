//! Numbered schema migrations for the product database.

use emporium_postgres::migrate::Migration;
use emporium_postgres::outbox::OUTBOX_MIGRATION;
use emporium_postgres::runs::WORKFLOW_RUNS_MIGRATION;

const PRODUCTS: &str = r"
CREATE TABLE IF NOT EXISTS products (
    product_id uuid PRIMARY KEY,
    name text NOT NULL,
    price numeric(18, 4) NOT NULL,
    quantity integer NOT NULL CHECK (quantity >= 0),
    created_at timestamptz NOT NULL,
    updated_at timestamptz NOT NULL,
    deleted_at timestamptz
);
";

const STOCK_RESERVATIONS: &str = r"
CREATE TABLE IF NOT EXISTS stock_reservations (
    reservation_key text PRIMARY KEY,
    product_id uuid NOT NULL,
    quantity integer NOT NULL CHECK (quantity > 0),
    created_at timestamptz NOT NULL
);
CREATE INDEX IF NOT EXISTS stock_reservations_product_idx ON stock_reservations (product_id);
";

/// All migrations in version order.
#[must_use]
pub fn migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "products",
            sql: PRODUCTS,
        },
        Migration {
            version: 2,
            name: "stock_reservations",
            sql: STOCK_RESERVATIONS,
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
