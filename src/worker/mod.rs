//! Workers (C5): the envelope each queue runs through a claimed row —
//! check the policy, then either reclaim it or push its next review out.
//!
//! Grounded in the teacher's `services::memory_decay_daemon`, which
//! separates "one maintenance pass" from the scheduling loop that drives
//! it repeatedly; [`crate::agent`] plays the scheduling-loop role here.

pub mod blob;
pub mod manifest;

use async_trait::async_trait;

use crate::error::WorkerError;

/// What one [`Worker::run_once`] call accomplished, used by the agent loop
/// (C6) to decide whether to reset or grow its backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// A row was claimed and acted on (reclaimed or postponed).
    Worked,
    /// Nothing was due.
    Idle,
}

/// One reclamation worker driving one review queue.
#[async_trait]
pub trait Worker: Send + Sync {
    /// A short, stable name for logging (§4.6 expects each worker's log
    /// lines to be attributable).
    fn name(&self) -> &'static str;

    /// Current queue depth, for status reporting.
    async fn queue_size(&self) -> Result<i64, WorkerError>;

    /// Claim and act on at most one due row. `Idle` means the caller
    /// should back off before calling again.
    async fn run_once(&self) -> Result<WorkerOutcome, WorkerError>;
}
