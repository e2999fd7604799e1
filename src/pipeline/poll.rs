//! Deadline-bounded polling shared by the waiting steps.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use super::{BuildError, CancelHandle};

/// Why a poll loop stopped without a value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PollError {
    /// The deadline passed.
    TimedOut,
    /// Cancellation was requested.
    Cancelled,
    /// The probe itself failed.
    Probe(BuildError),
}

impl PollError {
    /// Maps the outcome onto a [`BuildError::StateTimeout`] for
    /// `waiting_for`.
    #[must_use]
    pub fn into_state_error(self, waiting_for: &'static str, timeout: Duration) -> BuildError {
        match self {
            Self::TimedOut => BuildError::StateTimeout {
                waiting_for,
                timeout,
            },
            Self::Cancelled => BuildError::Cancelled,
            Self::Probe(err) => err,
        }
    }
}

/// Repeats a probe until it yields a value, the deadline passes, or the
/// build is cancelled.
///
/// Each iteration checks cancellation first and the deadline second, so a
/// zero timeout fails before the first probe.
#[derive(Debug)]
pub struct Poller<'a> {
    cancel: &'a CancelHandle,
    timeout: Duration,
    interval: Duration,
}

impl<'a> Poller<'a> {
    /// Creates a poller bounded by `timeout`.
    #[must_use]
    pub const fn new(cancel: &'a CancelHandle, timeout: Duration, interval: Duration) -> Self {
        Self {
            cancel,
            timeout,
            interval,
        }
    }

    /// Runs `probe` until it returns `Ok(Some(_))`.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::TimedOut`] once the deadline passes,
    /// [`PollError::Cancelled`] when cancellation is observed, and
    /// [`PollError::Probe`] when the probe fails.
    pub async fn until<T, F, Fut>(&self, mut probe: F) -> Result<T, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, BuildError>>,
    {
        let deadline = Instant::now().checked_add(self.timeout);
        loop {
            if self.cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }
            let remaining =
                deadline.map(|limit| limit.saturating_duration_since(Instant::now()));
            if remaining.is_some_and(|left| left.is_zero()) {
                return Err(PollError::TimedOut);
            }

            if let Some(value) = probe().await.map_err(PollError::Probe)? {
                return Ok(value);
            }

            let pause = deadline.map_or(self.interval, |limit| {
                self.interval
                    .min(limit.saturating_duration_since(Instant::now()))
            });
            sleep(pause).await;
        }
    }
}
