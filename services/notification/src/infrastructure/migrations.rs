//! Numbered schema migrations for the notification database.

use emporium_postgres::migrate::Migration;
use emporium_postgres::outbox::OUTBOX_MIGRATION;
use emporium_postgres::runs::WORKFLOW_RUNS_MIGRATION;

const NOTIFICATIONS: &str = r"
CREATE TABLE IF NOT EXISTS notifications (
    id uuid PRIMARY KEY,
    email text NOT NULL,
    message text NOT NULL,
    executed_at timestamptz,
    status text,
    created_at timestamptz NOT NULL,
    updated_at timestamptz NOT NULL,
    deleted_at timestamptz,
    CHECK ((status IS NULL) = (executed_at IS NULL))
);
";

const USERS: &str = r"
CREATE TABLE IF NOT EXISTS users (
    user_id uuid PRIMARY KEY,
    status integer NOT NULL,
    login text NOT NULL,
    email text,
    telegram text
);
";

/// All migrations in version order.
#[must_use]
pub fn migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "notifications",
            sql: NOTIFICATIONS,
        },
        Migration {
            version: 2,
            name: "users_projection",
            sql: USERS,
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
