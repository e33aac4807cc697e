//! Abstract time source (C1).
//!
//! Every place in the core that needs "now" or needs to sleep goes through
//! a [`Clock`] instead of calling `Utc::now()`/`tokio::time::sleep`
//! directly, so tests can substitute a [`FrozenClock`] and drive the §8
//! literal scenarios without a live timer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A source of time and sleep.
#[async_trait]
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;

    /// How long has elapsed since `since`.
    fn since(&self, since: DateTime<Utc>) -> Duration {
        (self.now() - since).to_std().unwrap_or(Duration::ZERO)
    }

    /// Suspend the caller for `duration`, honoring the clock's notion of
    /// time (a frozen clock resolves this immediately after advancing).
    async fn sleep(&self, duration: Duration);
}

/// The real clock: wall time and `tokio` timers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A deterministic clock for tests: `now()` is whatever was last set, and
/// `sleep` returns immediately (tests advance the clock explicitly instead
/// of waiting on a real timer).
#[derive(Debug, Clone)]
pub struct FrozenClock {
    inner: Arc<Mutex<DateTime<Utc>>>,
}

impl FrozenClock {
    /// Start frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut guard = self.inner.lock().expect("frozen clock mutex poisoned");
        *guard += chrono::Duration::from_std(duration).expect("duration out of range");
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, time: DateTime<Utc>) {
        *self.inner.lock().expect("frozen clock mutex poisoned") = time;
    }
}

#[async_trait]
impl Clock for FrozenClock {
    fn now(&self) -> DateTime<Utc> {
        *self.inner.lock().expect("frozen clock mutex poisoned")
    }

    async fn sleep(&self, _duration: Duration) {
        // Tests drive time explicitly via `advance`; there is nothing to
        // wait for.
    }
}
