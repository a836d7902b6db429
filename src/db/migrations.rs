//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use super::Database;

/// Ordered schema steps; each entry is applied once and recorded in `schema_version`
const MIGRATIONS: &[(i64, &[&str])] = &[(
    1,
    &[
        r#"
        CREATE TABLE acquired_episodes (
            series_id TEXT NOT NULL,
            season INTEGER NOT NULL,
            episode INTEGER NOT NULL,
            title TEXT NOT NULL,
            path TEXT NOT NULL,
            acquired_at INTEGER NOT NULL,
            PRIMARY KEY (series_id, season, episode)
        )
        "#,
        "CREATE INDEX idx_acquired_episodes_acquired_at ON acquired_episodes(series_id, acquired_at)",
    ],
)];

fn connection_error(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Database(DatabaseError::ConnectionFailed(format!("{context}: {e}")))
}

fn migration_error(version: i64, e: impl std::fmt::Display) -> Error {
    Error::Database(DatabaseError::MigrationFailed(format!("schema v{version}: {e}")))
}

impl Database {
    /// Open (or create) the ledger database at `path` and bring its schema up to date
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| connection_error("cannot create database directory", e))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| connection_error("invalid database path", e))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| connection_error("cannot open database", e))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY, applied_at INTEGER NOT NULL)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| migration_error(0, e))?;

        let applied: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "cannot read schema version: {e}"
                )))
            })?;
        let applied = applied.unwrap_or(0);

        for &(version, statements) in MIGRATIONS.iter().filter(|(v, _)| *v > applied) {
            self.apply(version, statements).await?;
        }
        Ok(())
    }

    /// Run one migration step inside a transaction; a failed step leaves the schema untouched
    async fn apply(&self, version: i64, statements: &[&str]) -> Result<()> {
        tracing::info!(version, "Applying schema migration");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| migration_error(version, e))?;

        for statement in statements {
            sqlx::query(*statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| migration_error(version, e))?;
        }

        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await
            .map_err(|e| migration_error(version, e))?;

        tx.commit().await.map_err(|e| migration_error(version, e))?;
        Ok(())
    }

    /// Close the connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
