//! The scheduling loop (C6) that drives a single [`Worker`] forever: run
//! until idle or erroring, back off, repeat — with a startup jitter so a
//! fleet of agents restarting together doesn't hammer the database in
//! lockstep, and cooperative cancellation for graceful shutdown.
//!
//! Grounded in the teacher's `services::memory_decay_daemon` loop shape
//! (a handle-controlled maintenance interval), adapted to back off on
//! idle/error instead of running on a fixed timer, and to use
//! `tokio_util::sync::CancellationToken` in place of the teacher's
//! `AtomicBool` stop flag.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::backoff::{BackoffConfig, GcBackoff};
use crate::clock::Clock;
use crate::error::GcError;
use crate::worker::{Worker, WorkerOutcome};

/// Behavior knobs for one agent loop, mirroring `gc.*` (§6).
#[derive(Debug, Clone, Copy)]
pub struct AgentConfig {
    /// Upper bound, in seconds, of the random delay applied once before
    /// the first poll.
    pub jitter_max_seconds: f64,
    /// When set, idle polls are retried immediately instead of backing
    /// off — only useful in tests driving a [`crate::clock::FrozenClock`].
    pub no_idle_backoff: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            jitter_max_seconds: 10.0,
            no_idle_backoff: false,
        }
    }
}

pub struct Agent {
    worker: Arc<dyn Worker>,
    clock: Arc<dyn Clock>,
    config: AgentConfig,
    cancellation: CancellationToken,
}

impl Agent {
    pub fn new(worker: Arc<dyn Worker>, clock: Arc<dyn Clock>, config: AgentConfig, cancellation: CancellationToken) -> Self {
        Self {
            worker,
            clock,
            config,
            cancellation,
        }
    }

    /// Runs [`Worker::run_once`] until `cancellation` fires, backing off
    /// exponentially on every idle or failed pass and resetting on every
    /// successful one. Every pass — worked, idle, or failed — sleeps for
    /// the resulting backoff interval before looping again; a worked or
    /// no-idle-backoff pass resets the interval down to `initial_interval`
    /// first rather than skipping the sleep outright.
    ///
    /// Returns `Ok(())` once cancelled, unless the pass running right
    /// before cancellation failed, in which case that error is returned
    /// instead of being swallowed.
    pub async fn run(&self) -> Result<(), GcError> {
        if !self.sleep_or_cancelled(self.startup_jitter()).await {
            return Ok(());
        }

        let mut backoff = GcBackoff::new(BackoffConfig::default());

        loop {
            if self.cancellation.is_cancelled() {
                break;
            }

            let mut failed = None;
            match self.worker.run_once().await {
                Ok(WorkerOutcome::Worked) => {
                    backoff.reset();
                }
                Ok(WorkerOutcome::Idle) => {
                    if self.config.no_idle_backoff {
                        backoff.reset();
                    }
                }
                Err(err) => {
                    tracing::warn!(worker = self.worker.name(), error = %err, "worker pass failed");
                    failed = Some(err);
                }
            }

            let delay = backoff.next_backoff();
            if !self.sleep_or_cancelled(delay).await {
                if let Some(err) = failed {
                    tracing::warn!(worker = self.worker.name(), "agent loop stopped while handling a failed pass");
                    return Err(err.into());
                }
                break;
            }
        }

        tracing::info!(worker = self.worker.name(), "agent loop stopped");
        Ok(())
    }

    fn startup_jitter(&self) -> Duration {
        if self.config.jitter_max_seconds <= 0.0 {
            return Duration::ZERO;
        }
        let seconds = rand::thread_rng().gen_range(0.0..self.config.jitter_max_seconds);
        Duration::from_secs_f64(seconds)
    }

    /// Sleeps for `duration` unless cancellation fires first. Returns
    /// `false` if the loop should stop.
    async fn sleep_or_cancelled(&self, duration: Duration) -> bool {
        tokio::select! {
            () = self.clock.sleep(duration) => true,
            () = self.cancellation.cancelled() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FrozenClock;
    use crate::error::WorkerError;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingWorker {
        calls: AtomicUsize,
        worked_for: usize,
    }

    #[async_trait]
    impl Worker for CountingWorker {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn queue_size(&self) -> Result<i64, WorkerError> {
            Ok(0)
        }

        async fn run_once(&self) -> Result<WorkerOutcome, WorkerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.worked_for {
                Ok(WorkerOutcome::Worked)
            } else {
                Ok(WorkerOutcome::Idle)
            }
        }
    }

    struct FailingWorker;

    #[async_trait]
    impl Worker for FailingWorker {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn queue_size(&self) -> Result<i64, WorkerError> {
            Ok(0)
        }

        async fn run_once(&self) -> Result<WorkerOutcome, WorkerError> {
            Err(WorkerError::Query(sqlx::Error::RowNotFound))
        }
    }

    #[tokio::test]
    async fn returns_the_last_error_when_cancelled_during_the_post_failure_backoff() {
        let worker = Arc::new(FailingWorker);
        let cancellation = CancellationToken::new();
        let agent = Agent::new(
            worker,
            Arc::new(crate::clock::SystemClock),
            AgentConfig { jitter_max_seconds: 0.0, no_idle_backoff: false },
            cancellation.clone(),
        );

        let token = cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let result = agent.run().await;
        assert!(result.is_err(), "a failed pass right before cancellation must surface, not be swallowed");
    }

    #[tokio::test]
    async fn stops_promptly_once_cancelled() {
        let worker = Arc::new(CountingWorker {
            calls: AtomicUsize::new(0),
            worked_for: 0,
        });
        let cancellation = CancellationToken::new();
        let agent = Agent::new(
            worker,
            Arc::new(FrozenClock::new(Utc::now())),
            AgentConfig { jitter_max_seconds: 0.0, no_idle_backoff: false },
            cancellation.clone(),
        );

        cancellation.cancel();
        agent.run().await.unwrap();
    }

    #[tokio::test]
    async fn keeps_working_without_backing_off_while_there_is_work() {
        let worker = Arc::new(CountingWorker {
            calls: AtomicUsize::new(0),
            worked_for: 5,
        });
        let cancellation = CancellationToken::new();
        let agent = Agent::new(
            worker.clone(),
            Arc::new(FrozenClock::new(Utc::now())),
            AgentConfig { jitter_max_seconds: 0.0, no_idle_backoff: false },
            cancellation.clone(),
        );

        let token = cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });
        agent.run().await.unwrap();

        assert!(worker.calls.load(Ordering::SeqCst) >= 5);
    }
}
