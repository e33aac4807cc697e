//! `gc_blob_review_queue` access.

use chrono::{DateTime, Utc};
use sqlx::{SqlitePool, SqliteConnection};

use crate::error::QueueError;
use crate::model::{BlobReviewRow, Digest};
use crate::queue::{from_epoch_seconds, to_epoch_seconds};

#[derive(Clone)]
pub struct BlobReviewQueue {
    pool: SqlitePool,
}

impl BlobReviewQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Reads the most overdue row with `review_after <= now`, if any.
    /// Must be called on the connection of a transaction the caller keeps
    /// open through its decision and its `postpone`/`delete` (§4.2): that
    /// transaction is the lock, there is no separate claim step to race.
    pub async fn next(&self, tx: &mut SqliteConnection, now: DateTime<Utc>) -> Result<Option<BlobReviewRow>, QueueError> {
        let candidate: Option<(String, i64, i64)> = sqlx::query_as(
            "SELECT digest, review_after, review_count FROM gc_blob_review_queue
             WHERE review_after <= ? ORDER BY review_after ASC, digest ASC LIMIT 1",
        )
        .bind(to_epoch_seconds(now))
        .fetch_optional(&mut *tx)
        .await?;

        Ok(candidate.map(|(digest, review_after, review_count)| BlobReviewRow {
            digest: Digest(digest),
            review_after: from_epoch_seconds(review_after),
            review_count,
        }))
    }

    /// A claimed blob turned out to still be referenced: push its next
    /// review out to `review_after` and bump `review_count` (§4.5 step 4).
    pub async fn postpone(&self, tx: &mut SqliteConnection, digest: &Digest, review_after: DateTime<Utc>) -> Result<(), QueueError> {
        let result = sqlx::query(
            "UPDATE gc_blob_review_queue SET review_after = ?, review_count = review_count + 1
             WHERE digest = ?",
        )
        .bind(to_epoch_seconds(review_after))
        .bind(&digest.0)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::RowVanished(digest.to_string()));
        }
        Ok(())
    }

    /// Removes a queue row outright: either the blob itself was deleted
    /// (cascades take care of this automatically) or the caller is
    /// explicitly dropping tracking for a digest that is no longer a
    /// candidate.
    pub async fn delete(&self, tx: &mut SqliteConnection, digest: &Digest) -> Result<(), QueueError> {
        sqlx::query("DELETE FROM gc_blob_review_queue WHERE digest = ?")
            .bind(&digest.0)
            .execute(&mut *tx)
            .await?;
        Ok(())
    }

    /// Inserts or refreshes a row, never moving `review_after` earlier
    /// than what is already stored (§3.2's monotonicity invariant). Runs
    /// in its own autocommit statement: in production this is only ever
    /// called by the §4.3 triggers, never from inside a worker envelope.
    /// Tests use it directly to seed scenarios without going through one.
    pub async fn enqueue(&self, digest: &Digest, review_after: DateTime<Utc>) -> Result<(), QueueError> {
        sqlx::query(
            "INSERT INTO gc_blob_review_queue (digest, review_after, review_count) VALUES (?, ?, 0)
             ON CONFLICT (digest) DO UPDATE SET review_after = MAX(review_after, excluded.review_after)",
        )
        .bind(&digest.0)
        .bind(to_epoch_seconds(review_after))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
