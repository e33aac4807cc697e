//! The blob reclamation worker: claims a due `gc_blob_review_queue` row,
//! checks whether anything still references the blob, and either deletes
//! it (database row plus storage payload) or stops tracking it.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{StorageError, WorkerError};
use crate::policy;
use crate::queue::blob::BlobReviewQueue;
use crate::storage::StorageDriver;
use crate::worker::{Worker, WorkerOutcome};

pub struct BlobWorker {
    pool: SqlitePool,
    queue: BlobReviewQueue,
    storage: Arc<dyn StorageDriver>,
    clock: Arc<dyn Clock>,
}

impl BlobWorker {
    pub fn new(pool: SqlitePool, storage: Arc<dyn StorageDriver>, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue: BlobReviewQueue::new(pool.clone()),
            pool,
            storage,
            clock,
        }
    }
}

#[async_trait]
impl Worker for BlobWorker {
    fn name(&self) -> &'static str {
        "blob"
    }

    async fn queue_size(&self) -> Result<i64, WorkerError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM gc_blob_review_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn run_once(&self) -> Result<WorkerOutcome, WorkerError> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        let Some(row) = self.queue.next(&mut tx, now).await? else {
            tx.commit().await?;
            return Ok(WorkerOutcome::Idle);
        };

        // Claim, policy check, and the delete-or-stop-tracking decision
        // all run inside this one transaction (§4.2/§4.5), so nothing can
        // observe the row between "still referenced" and the commit that
        // removes it from the queue.
        if policy::is_blob_unreferenced(&mut tx, &row.digest).await? {
            sqlx::query("DELETE FROM blobs WHERE digest = ?")
                .bind(&row.digest.0)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            tracing::info!(digest = %row.digest, "reclaimed unreferenced blob");

            // The database row is already gone; storage deletion is a
            // best-effort cleanup that happens after the commit, never
            // before it (§4.5 step 3, §7: a storage failure here orphans
            // an object, it must never leave a dangling database row).
            match self.storage.delete(&row.digest).await {
                Ok(()) | Err(StorageError::NotFound) => {}
                Err(err) => {
                    tracing::warn!(
                        digest = %row.digest,
                        error = %err,
                        "storage delete failed after the blob row was already removed; object orphaned in storage"
                    );
                }
            }
        } else {
            self.queue.delete(&mut tx, &row.digest).await?;
            tx.commit().await?;
            tracing::debug!(digest = %row.digest, "blob still referenced; stopped tracking");
        }

        Ok(WorkerOutcome::Worked)
    }
}
