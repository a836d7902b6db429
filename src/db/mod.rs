//! Database layer for series-dl
//!
//! Handles SQLite persistence for the dedup ledger.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`ledger`]: Acquired-episode records ([`LedgerStore`](crate::ledger::LedgerStore) implementation)

use sqlx::{FromRow, sqlite::SqlitePool};

mod ledger;
mod migrations;

/// Acquired-episode record from database
#[derive(Debug, Clone, FromRow)]
pub struct AcquiredRow {
    /// Series the episode belongs to
    pub series_id: String,
    /// Season key
    pub season: i64,
    /// Episode number
    pub episode: i64,
    /// Feed entry title
    pub title: String,
    /// Library path the payload was moved to
    pub path: String,
    /// Unix timestamp of the handoff
    pub acquired_at: i64,
}

/// Database handle for series-dl
pub struct Database {
    pool: SqlitePool,
}
