//! Crate-wide error taxonomy.
//!
//! Each failure domain gets its own `thiserror` enum, composed into
//! [`GcError`] at the boundaries that cross domains (the agent loop, the
//! public migration API). This mirrors the layering the teacher codebase
//! uses between `domain::error::DomainError` and the narrower
//! `infrastructure::database::DatabaseError`.

use thiserror::Error;

/// Errors raised by the review-queue store (C2).
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// The row a caller expected to still hold the lock on had already
    /// been removed by another actor before the expected mutation ran.
    #[error("queue row for {0} vanished before it could be acted on")]
    RowVanished(String),
}

/// Errors raised by [`crate::policy`] (C4).
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Errors raised by a [`crate::worker::Worker`] (C5).
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Errors raised by [`crate::storage::StorageDriver`] implementations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The object was already absent. Callers treat this as success.
    #[error("object not found")]
    NotFound,

    #[error("storage driver error: {0}")]
    Other(#[source] anyhow::Error),
}

/// Errors raised by the migration registry (C7).
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("migration {id} failed: {source}")]
    StepFailed {
        id: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Top-level error type for operations that can fail in more than one
/// subsystem, such as the agent loop driving a worker.
#[derive(Debug, Error)]
pub enum GcError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
