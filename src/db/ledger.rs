//! Acquired-episode ledger operations.

use crate::error::DatabaseError;
use crate::ledger::{AcquiredEpisode, DedupRecord, LedgerStore};
use crate::{Error, Result};
use async_trait::async_trait;

use super::{AcquiredRow, Database};

impl Database {
    /// All acquired episodes of a series, oldest first
    pub async fn get_acquired_episodes(&self, series_id: &str) -> Result<Vec<AcquiredRow>> {
        let rows = sqlx::query_as::<_, AcquiredRow>(
            r#"
            SELECT series_id, season, episode, title, path, acquired_at
            FROM acquired_episodes
            WHERE series_id = ?
            ORDER BY acquired_at ASC, season ASC, episode ASC
            "#,
        )
        .bind(series_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get acquired episodes: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Insert acquired episodes in one transaction, ignoring ones already recorded
    ///
    /// Returns how many rows were newly inserted.
    pub async fn insert_acquired_episodes(
        &self,
        series_id: &str,
        episodes: &[AcquiredEpisode],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let mut inserted = 0;
        for episode in episodes {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO acquired_episodes
                    (series_id, season, episode, title, path, acquired_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(series_id)
            .bind(i64::from(episode.season))
            .bind(i64::from(episode.episode))
            .bind(&episode.title)
            .bind(episode.path.to_string_lossy().into_owned())
            .bind(episode.acquired_at.timestamp())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert acquired episode: {}",
                    e
                )))
            })?;
            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit acquired episodes: {}",
                e
            )))
        })?;

        Ok(inserted)
    }
}

#[async_trait]
impl LedgerStore for Database {
    async fn load(&self, series_id: &str) -> Result<DedupRecord> {
        let rows = self.get_acquired_episodes(series_id).await?;
        rows.into_iter()
            .map(|row| {
                let season = u32::try_from(row.season);
                let episode = u32::try_from(row.episode);
                match (season, episode) {
                    (Ok(season), Ok(episode)) => Ok((season, episode)),
                    _ => Err(Error::Database(DatabaseError::QueryFailed(format!(
                        "Corrupt ledger row for {}: season {} episode {}",
                        row.series_id, row.season, row.episode
                    )))),
                }
            })
            .collect()
    }

    async fn commit(&self, series_id: &str, episodes: &[AcquiredEpisode]) -> Result<()> {
        if episodes.is_empty() {
            return Ok(());
        }
        let inserted = self.insert_acquired_episodes(series_id, episodes).await?;
        tracing::debug!(
            series = %series_id,
            inserted,
            submitted = episodes.len(),
            "Ledger committed"
        );
        Ok(())
    }
}
