//! Numbered schema migrations for the user database.

use emporium_postgres::migrate::Migration;
use emporium_postgres::outbox::OUTBOX_MIGRATION;
use emporium_postgres::runs::WORKFLOW_RUNS_MIGRATION;

const USERS: &str = r"
CREATE TABLE IF NOT EXISTS users (
    user_id uuid PRIMARY KEY,
    login text NOT NULL,
    status integer NOT NULL,
    email text,
    telegram text,
    created_at timestamptz NOT NULL,
    updated_at timestamptz NOT NULL,
    deleted_at timestamptz
);
CREATE UNIQUE INDEX IF NOT EXISTS users_login_idx ON users (login);
CREATE UNIQUE INDEX IF NOT EXISTS users_email_idx ON users (email) WHERE email IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS users_telegram_idx ON users (telegram) WHERE telegram IS NOT NULL;
";

/// All migrations in version order.
#[must_use]
pub fn migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "users",
            sql: USERS,
        },
        Migration {
            version: 2,
            name: "outbox",
            sql: OUTBOX_MIGRATION,
        },
        Migration {
            version: 3,
            name: "workflow_runs",
            sql: WORKFLOW_RUNS_MIGRATION,
        },
    ]
}
