//! `gc_manifest_review_queue` access.

use chrono::{DateTime, Utc};
use sqlx::{SqlitePool, SqliteConnection};

use crate::error::QueueError;
use crate::model::{ManifestId, ManifestReviewRow, RepositoryId};
use crate::queue::{from_epoch_seconds, to_epoch_seconds};

#[derive(Clone)]
pub struct ManifestReviewQueue {
    pool: SqlitePool,
}

impl ManifestReviewQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Reads the most overdue row with `review_after <= now`, if any.
    /// Must be called on the connection of a transaction the caller keeps
    /// open through its decision and its `postpone`/`delete` (§4.2).
    pub async fn next(&self, tx: &mut SqliteConnection, now: DateTime<Utc>) -> Result<Option<ManifestReviewRow>, QueueError> {
        let candidate: Option<(RepositoryId, ManifestId, i64, i64)> = sqlx::query_as(
            "SELECT repository_id, manifest_id, review_after, review_count FROM gc_manifest_review_queue
             WHERE review_after <= ? ORDER BY review_after ASC, repository_id ASC, manifest_id ASC LIMIT 1",
        )
        .bind(to_epoch_seconds(now))
        .fetch_optional(&mut *tx)
        .await?;

        Ok(candidate.map(|(repository_id, manifest_id, review_after, review_count)| ManifestReviewRow {
            repository_id,
            manifest_id,
            review_after: from_epoch_seconds(review_after),
            review_count,
        }))
    }

    /// A claimed manifest turned out to still be referenced: push its
    /// next review out and bump `review_count`.
    pub async fn postpone(
        &self,
        tx: &mut SqliteConnection,
        repository_id: RepositoryId,
        manifest_id: ManifestId,
        review_after: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        let result = sqlx::query(
            "UPDATE gc_manifest_review_queue SET review_after = ?, review_count = review_count + 1
             WHERE repository_id = ? AND manifest_id = ?",
        )
        .bind(to_epoch_seconds(review_after))
        .bind(repository_id)
        .bind(manifest_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::RowVanished(format!(
                "repository {repository_id} manifest {manifest_id}"
            )));
        }
        Ok(())
    }

    /// Removes a queue row outright.
    pub async fn delete(&self, tx: &mut SqliteConnection, repository_id: RepositoryId, manifest_id: ManifestId) -> Result<(), QueueError> {
        sqlx::query("DELETE FROM gc_manifest_review_queue WHERE repository_id = ? AND manifest_id = ?")
            .bind(repository_id)
            .bind(manifest_id)
            .execute(&mut *tx)
            .await?;
        Ok(())
    }

    /// Inserts or refreshes a row, never moving `review_after` earlier.
    pub async fn enqueue(
        &self,
        repository_id: RepositoryId,
        manifest_id: ManifestId,
        review_after: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        sqlx::query(
            "INSERT INTO gc_manifest_review_queue (repository_id, manifest_id, review_after, review_count)
             VALUES (?, ?, ?, 0)
             ON CONFLICT (repository_id, manifest_id) DO UPDATE SET
                review_after = MAX(review_after, excluded.review_after)",
        )
        .bind(repository_id)
        .bind(manifest_id)
        .bind(to_epoch_seconds(review_after))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
