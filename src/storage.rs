//! The blob storage driver interface consumed by blob reclamation (§6).
//!
//! The concrete backends (filesystem/S3/GCS) are external collaborators
//! per §1 — this crate only defines the narrow interface workers call
//! through, plus a couple of trivial implementations used in tests.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::StorageError;
use crate::model::Digest;

/// Deletes blob payloads from wherever they actually live.
///
/// Implementations must treat concurrent `delete` calls for the same
/// digest as safe (idempotent) — §5 assumes this since storage calls are
/// issued outside the database transaction that authorizes them.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Delete the object named by `digest`. Implementations should return
    /// [`StorageError::NotFound`] rather than treat a missing object as a
    /// hard failure; callers already consider the DB state authoritative.
    async fn delete(&self, digest: &Digest) -> Result<(), StorageError>;
}

/// A [`StorageDriver`] that records every digest it was asked to delete
/// and always succeeds. Used by worker tests to assert "delete was called
/// exactly once" (§8 scenario 1) and "delete was not called" (scenario 2).
#[derive(Debug, Default)]
pub struct RecordingStorageDriver {
    deleted: Mutex<Vec<Digest>>,
}

impl RecordingStorageDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Digests passed to `delete` so far, in call order.
    pub fn deleted(&self) -> Vec<Digest> {
        self.deleted.lock().expect("mutex poisoned").clone()
    }

    pub fn delete_count(&self, digest: &Digest) -> usize {
        self.deleted()
            .iter()
            .filter(|deleted| *deleted == digest)
            .count()
    }
}

#[async_trait]
impl StorageDriver for RecordingStorageDriver {
    async fn delete(&self, digest: &Digest) -> Result<(), StorageError> {
        self.deleted
            .lock()
            .expect("mutex poisoned")
            .push(digest.clone());
        Ok(())
    }
}

/// A [`StorageDriver`] whose `delete` always fails with a non-`NotFound`
/// error, for exercising the "storage errors are logged, not re-enqueued"
/// path in §7.
#[derive(Debug, Default)]
pub struct FailingStorageDriver;

#[async_trait]
impl StorageDriver for FailingStorageDriver {
    async fn delete(&self, _digest: &Digest) -> Result<(), StorageError> {
        Err(StorageError::Other(anyhow::anyhow!(
            "simulated storage backend outage"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_driver_tracks_calls() {
        let driver = RecordingStorageDriver::new();
        let digest: Digest = "sha256:aaaa".into();

        driver.delete(&digest).await.unwrap();
        driver.delete(&digest).await.unwrap();

        assert_eq!(driver.delete_count(&digest), 2);
        assert_eq!(driver.deleted(), vec![digest.clone(), digest]);
    }

    #[tokio::test]
    async fn failing_driver_never_returns_not_found() {
        let driver = FailingStorageDriver;
        let err = driver.delete(&"sha256:aaaa".into()).await.unwrap_err();
        assert!(!matches!(err, StorageError::NotFound));
    }
}
