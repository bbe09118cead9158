//! Numbered schema migrations for the order database.

use emporium_postgres::migrate::Migration;
use emporium_postgres::outbox::OUTBOX_MIGRATION;
use emporium_postgres::runs::WORKFLOW_RUNS_MIGRATION;

const ORDERS: &str = r"
CREATE TABLE IF NOT EXISTS orders (
    order_id uuid PRIMARY KEY,
    customer_id uuid NOT NULL,
    status integer NOT NULL,
    created_at timestamptz NOT NULL,
    updated_at timestamptz NOT NULL,
    deleted_at timestamptz
);
";

const ORDER_ITEMS: &str = r"
CREATE TABLE IF NOT EXISTS order_items (
    order_id uuid NOT NULL REFERENCES orders (order_id),
    product_id uuid NOT NULL,
    count integer NOT NULL CHECK (count > 0),
    total_price numeric(18, 4) NOT NULL
);
CREATE INDEX IF NOT EXISTS order_items_order_idx ON order_items (order_id);
";

/// All migrations in version order.
#[must_use]
pub fn migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "orders",
            sql: ORDERS,
        },
        Migration {
            version: 2,
            name: "order_items",
            sql: ORDER_ITEMS,
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
