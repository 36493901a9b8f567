//! Fixed-delay state polling.
//!
//! [`wait_for`] re-runs a snapshot function until a predicate holds. A
//! missing snapshot counts as "not yet done". By default the loop has no
//! ceiling; [`PollSpec`] can bound it by attempts or by consecutive failed
//! fetches, in which case a distinct [`PollOutcome`] is returned.

mod progress;

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

pub use progress::{NoProgress, ProgressSink, hidden, spinner};

/// Delay used while a deployment run is in progress.
pub const DEPLOYMENT_POLL_DELAY: Duration = Duration::from_secs(3);
/// Delay between SSH readiness attempts.
pub const SSH_POLL_DELAY: Duration = Duration::from_secs(5);
/// Delay used when no operation-specific delay applies.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(10);

/// Timing and ceilings for one polling loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollSpec {
    delay: Duration,
    max_attempts: Option<u32>,
    max_consecutive_failures: Option<u32>,
}

impl PollSpec {
    /// Unbounded polling with the given delay between checks.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
            max_consecutive_failures: None,
        }
    }

    /// Caps the number of state checks.
    #[must_use]
    pub const fn with_max_attempts(mut self, limit: Option<u32>) -> Self {
        self.max_attempts = limit;
        self
    }

    /// Caps the number of back-to-back failed fetches.
    #[must_use]
    pub const fn with_max_consecutive_failures(mut self, limit: Option<u32>) -> Self {
        self.max_consecutive_failures = limit;
        self
    }

    /// Delay between checks.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Attempt ceiling, if any.
    #[must_use]
    pub const fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}

impl Default for PollSpec {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_DELAY)
    }
}

/// How a polling loop ended.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PollOutcome<T> {
    /// The predicate held for this snapshot.
    Done(T),
    /// The attempt ceiling was reached first.
    TimedOut {
        /// Number of checks performed.
        attempts: u32,
        /// Most recent snapshot that was fetched, if any.
        last: Option<T>,
    },
    /// Too many fetches in a row produced no snapshot.
    FetchFailed {
        /// Length of the failure streak.
        consecutive: u32,
    },
}

impl<T> PollOutcome<T> {
    /// Returns the final snapshot when the predicate held.
    #[must_use]
    pub fn done(self) -> Option<T> {
        match self {
            Self::Done(snapshot) => Some(snapshot),
            Self::TimedOut { .. } | Self::FetchFailed { .. } => None,
        }
    }
}

/// Polls `snapshot` until `is_done` holds.
///
/// Each unsatisfied check ticks `progress` once and then sleeps for the
/// configured delay. The loop returns before sleeping once the predicate
/// holds.
pub async fn wait_for<T, F, P, S>(
    spec: &PollSpec,
    mut snapshot: F,
    mut is_done: P,
    progress: &mut S,
) -> PollOutcome<T>
where
    F: AsyncFnMut() -> Option<T>,
    P: FnMut(&T) -> bool,
    S: ProgressSink + ?Sized,
{
    let mut attempts: u32 = 0;
    let mut failures: u32 = 0;
    let mut last = None;

    loop {
        attempts = attempts.saturating_add(1);
        match snapshot().await {
            Some(current) => {
                failures = 0;
                if is_done(&current) {
                    debug!(attempts, "poll condition met");
                    return PollOutcome::Done(current);
                }
                last = Some(current);
            }
            None => {
                failures = failures.saturating_add(1);
                debug!(attempts, failures, "poll snapshot unavailable");
                if spec
                    .max_consecutive_failures
                    .is_some_and(|limit| failures >= limit)
                {
                    return PollOutcome::FetchFailed {
                        consecutive: failures,
                    };
                }
            }
        }

        if spec.max_attempts.is_some_and(|limit| attempts >= limit) {
            return PollOutcome::TimedOut { attempts, last };
        }

        progress.tick();
        sleep(spec.delay).await;
    }
}

/// Predicate for "reach state Y": done once the state equals `target`.
pub fn until_state<T: PartialEq>(target: T) -> impl FnMut(&T) -> bool {
    move |state| *state == target
}

/// Predicate for "exit state X": done once the state differs from `current`.
pub fn while_state<T: PartialEq>(current: T) -> impl FnMut(&T) -> bool {
    move |state| *state != current
}

#[cfg(test)]
mod tests;
