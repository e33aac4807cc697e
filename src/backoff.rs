//! Exponential backoff with jitter and cap (C1).
//!
//! Thin wrapper around the `backoff` crate's `ExponentialBackoff`, the
//! same dependency the teacher (`abathur`) already pulls in for retry
//! logic. We don't hand-roll jittered exponential backoff when a
//! well-tested crate in the corpus's own dependency graph already does it.

use std::time::Duration;

use backoff::backoff::Backoff as _;
use backoff::ExponentialBackoff;

/// Tunables for [`GcBackoff`], matching the `gc.{initial_interval,
/// max_backoff}` configuration surface in §6.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    pub randomization_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(300),
            multiplier: 1.5,
            randomization_factor: 0.33,
        }
    }
}

/// Exponential backoff with jitter and a cap, and no elapsed-time limit
/// (`MaxElapsedTime = ∞`, i.e. the agent never "gives up" per §4.1).
pub struct GcBackoff {
    config: BackoffConfig,
    inner: ExponentialBackoff,
}

impl GcBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            inner: Self::build(&config),
            config,
        }
    }

    fn build(config: &BackoffConfig) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: config.initial_interval,
            initial_interval: config.initial_interval,
            randomization_factor: config.randomization_factor,
            multiplier: config.multiplier,
            max_interval: config.max_interval,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }

    /// Compute the next backoff interval, advancing internal state.
    ///
    /// `ExponentialBackoff::next_backoff` returns `None` once
    /// `max_elapsed_time` is exceeded; since that's always `None` here,
    /// this never happens, so we unwrap to the max interval defensively
    /// rather than panic if that invariant is ever relaxed.
    pub fn next_backoff(&mut self) -> Duration {
        self.inner
            .next_backoff()
            .unwrap_or(self.config.max_interval)
    }

    /// Reset to `initial_interval`, as happens after a successful
    /// (`found=true`) run, or an idle run when `no_idle_backoff` is set.
    pub fn reset(&mut self) {
        self.inner.reset();
    }
}
