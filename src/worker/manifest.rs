//! The manifest reclamation worker: claims a due
//! `gc_manifest_review_queue` row and either deletes the manifest (no
//! storage side effect — the blob layer's own triggers handle fallout)
//! or stops tracking it.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::WorkerError;
use crate::policy;
use crate::queue::manifest::ManifestReviewQueue;
use crate::worker::{Worker, WorkerOutcome};
use crate::clock::Clock;
use std::sync::Arc;

pub struct ManifestWorker {
    pool: SqlitePool,
    queue: ManifestReviewQueue,
    clock: Arc<dyn Clock>,
}

impl ManifestWorker {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue: ManifestReviewQueue::new(pool.clone()),
            pool,
            clock,
        }
    }
}

#[async_trait]
impl Worker for ManifestWorker {
    fn name(&self) -> &'static str {
        "manifest"
    }

    async fn queue_size(&self) -> Result<i64, WorkerError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM gc_manifest_review_queue")
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

        // Claim, policy check, and delete-or-stop-tracking all run inside
        // this one transaction (§4.2/§4.5).
        if policy::is_manifest_unreferenced(&mut tx, row.repository_id, row.manifest_id).await? {
            sqlx::query("DELETE FROM manifests WHERE id = ?")
                .bind(row.manifest_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            tracing::info!(
                repository_id = row.repository_id,
                manifest_id = row.manifest_id,
                "reclaimed unreferenced manifest"
            );
        } else {
            self.queue.delete(&mut tx, row.repository_id, row.manifest_id).await?;
            tx.commit().await?;
            tracing::debug!(
                repository_id = row.repository_id,
                manifest_id = row.manifest_id,
                "manifest still referenced; stopped tracking"
            );
        }

        Ok(WorkerOutcome::Worked)
    }
}
