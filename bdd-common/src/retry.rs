//! Backoff retry engine for convergence waits.
//!
//! Provides an exponential-backoff retry loop bounded by an elapsed-time
//! budget, plus the [`RetryableError`] classification trait the loop uses to
//! decide between retrying and failing fast.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Errors that can be retried.
///
/// Most failures in this suite are retryable until the budget runs out:
/// cluster records that do not exist yet, output that does not parse yet,
/// URLs that do not answer yet. Only definitively terminal conditions (a
/// pipeline that reached a failed status) report `false`.
pub trait RetryableError {
    /// Whether the retry loop should keep going after this error.
    fn is_retryable(&self) -> bool;
}

/// Exponential backoff policy for one convergence wait.
///
/// Immutable once the wait starts; owned by the caller.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt.
    pub initial_interval: Duration,
    /// Growth factor applied per attempt (minimum 1.0).
    pub multiplier: f64,
    /// Ceiling on the per-attempt delay.
    pub max_interval: Duration,
    /// Jitter fraction (0.0-1.0) applied to each delay.
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::slow()
    }
}

impl BackoffPolicy {
    /// Profile for interactive waits: short cap so a quick recovery is
    /// noticed quickly.
    pub fn fast() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(5),
            jitter: 0.0,
        }
    }

    /// Profile for eventually-consistent convergence waits: delays grow to a
    /// cap of tens of seconds so long polls do not hammer the cluster.
    pub fn slow() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(20),
            jitter: 0.0,
        }
    }

    /// Add jitter to the delays. The termination guarantee is unaffected:
    /// jitter perturbs sleep lengths, never the budget accounting.
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Calculate the backoff delay for a given attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let base_secs = self.initial_interval.as_secs_f64();
        let max_secs = self.max_interval.as_secs_f64().max(0.0);

        let factor = self.multiplier.max(1.0).powi(attempt.saturating_sub(1) as i32);
        let mut delay = (base_secs * factor).min(max_secs);

        if self.jitter > 0.0 && delay > 0.0 {
            let jitter = (rand::random::<f64>() * 2.0 - 1.0) * self.jitter;
            delay = (delay * (1.0 + jitter)).max(0.0);
        }

        Duration::from_secs_f64(delay)
    }
}

/// Terminal outcome of a retry loop that did not converge.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E>
where
    E: fmt::Display + fmt::Debug,
{
    /// The elapsed-time budget ran out; carries the last observed error.
    #[error("budget of {budget:?} exhausted after {attempts} attempts: {last}")]
    BudgetExhausted {
        budget: Duration,
        attempts: u32,
        last: E,
    },

    /// The operation reported a non-retryable condition.
    #[error("{0}")]
    Fatal(E),
}

impl<E> RetryError<E>
where
    E: fmt::Display + fmt::Debug,
{
    /// The underlying error, whichever way the loop ended.
    pub fn into_inner(self) -> E {
        match self {
            Self::BudgetExhausted { last, .. } => last,
            Self::Fatal(err) => err,
        }
    }

    /// Whether this loop ended by running out its budget.
    pub fn is_budget_exhausted(&self) -> bool {
        matches!(self, Self::BudgetExhausted { .. })
    }
}

/// Run `op` repeatedly with exponential backoff until it succeeds, reports a
/// non-retryable error, or `max_elapsed` has passed.
///
/// The operation is always attempted at least once, with no sleep before the
/// first attempt — a zero budget means exactly one attempt. The budget is
/// checked after each failed attempt, so exhaustion is reported no earlier
/// than `max_elapsed` and no later than `max_elapsed` plus one backoff
/// interval.
///
/// Each call is independent; the loop holds no state beyond its own
/// counters, so concurrent waits from separate test threads are fine.
pub fn retry_until<T, E, F>(
    max_elapsed: Duration,
    policy: &BackoffPolicy,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Result<T, E>,
    E: RetryableError + fmt::Display + fmt::Debug,
{
    let start = Instant::now();
    let mut attempt: u32 = 1;

    debug!(
        budget_secs = max_elapsed.as_secs_f64(),
        max_interval_secs = policy.max_interval.as_secs_f64(),
        "starting convergence wait"
    );

    loop {
        match op() {
            Ok(value) => {
                debug!(
                    attempt,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "converged"
                );
                return Ok(value);
            }
            Err(err) if !err.is_retryable() => {
                warn!(attempt, error = %err, "non-retryable failure, giving up");
                return Err(RetryError::Fatal(err));
            }
            Err(err) => {
                let elapsed = start.elapsed();
                if elapsed >= max_elapsed {
                    warn!(
                        attempt,
                        elapsed_secs = elapsed.as_secs_f64(),
                        error = %err,
                        "convergence budget exhausted"
                    );
                    return Err(RetryError::BudgetExhausted {
                        budget: max_elapsed,
                        attempts: attempt,
                        last: err,
                    });
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    delay_secs = delay.as_secs_f64(),
                    error = %err,
                    "attempt failed, retrying after backoff"
                );
                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}
