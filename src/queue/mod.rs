//! Review queues (C2): durable, due-time-ordered sets of blobs/manifests
//! awaiting a reclamation decision.
//!
//! SQLite has no `SELECT ... FOR UPDATE SKIP LOCKED`. Instead, `next`,
//! `postpone`, and `delete` all take the connection of the transaction the
//! worker opened for its whole claim → decide → act envelope (§4.2), the
//! same way the teacher's `task_repo` functions take a `&mut PgConnection`
//! borrowed from the caller's transaction rather than owning a pool. A
//! second worker racing for the same row blocks on SQLite's single-writer
//! lock until the first transaction commits or rolls back, instead of
//! losing an optimistic compare-and-swap.

pub mod blob;
pub mod manifest;

use chrono::{DateTime, TimeZone, Utc};

pub(crate) fn to_epoch_seconds(time: DateTime<Utc>) -> i64 {
    time.timestamp()
}

pub(crate) fn from_epoch_seconds(epoch: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(epoch, 0).single().unwrap_or_else(Utc::now)
}
