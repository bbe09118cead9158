//! Numbered schema migrations.
//!
//! Each service declares its migrations as an ordered list of SQL scripts;
//! applied versions are recorded in `schema_migrations` so reruns are
//! no-ops. The `migrate` subcommand applies them explicitly and the
//! `service` subcommand applies them on boot.

use sqlx::PgPool;
use tracing::info;

/// One migration step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Monotonic version number.
    pub version: i64,
    /// Human-readable name, recorded alongside the version.
    pub name: &'static str,
    /// The SQL to run; may contain multiple statements.
    pub sql: &'static str,
}

/// Applies migrations against one database.
pub struct Migrator {
    pool: PgPool,
}

impl Migrator {
    /// Migrator over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply all unapplied migrations in version order.
    ///
    /// Each migration runs in its own transaction together with the
    /// version bookkeeping, so a failed script leaves no partial marker.
    ///
    /// # Errors
    ///
    /// Returns the underlying `sqlx` error of the failing script.
    pub async fn apply(&self, migrations: &[Migration]) -> Result<u32, sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version bigint PRIMARY KEY,
                name text NOT NULL,
                applied_at timestamptz NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await?;

        let mut sorted: Vec<&Migration> = migrations.iter().collect();
        sorted.sort_by_key(|m| m.version);

        let mut applied = 0;
        for migration in sorted {
            let exists: Option<(i64,)> =
                sqlx::query_as("SELECT version FROM schema_migrations WHERE version = $1")
                    .bind(migration.version)
                    .fetch_optional(&self.pool)
                    .await?;
            if exists.is_some() {
                continue;
            }

            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(migration.sql).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_migrations (version, name) VALUES ($1, $2)")
                .bind(migration.version)
                .bind(migration.name)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            info!(version = migration.version, name = migration.name, "migration applied");
            applied += 1;
        }
        Ok(applied)
    }
}
