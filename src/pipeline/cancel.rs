//! Cross-task cancellation and runner status.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Lifecycle of a [`super::Runner`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunnerStatus {
    /// Not started.
    Idle,
    /// Executing steps.
    Running,
    /// Every step succeeded.
    Completed,
    /// A step failed and the pipeline unwound.
    Halted,
    /// Cancellation was requested and the pipeline unwound.
    Cancelled,
}

impl RunnerStatus {
    /// Returns `true` once the runner can no longer change state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Halted | Self::Cancelled)
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Completed => 2,
            Self::Halted => 3,
            Self::Cancelled => 4,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Halted,
            4 => Self::Cancelled,
            _ => Self::Idle,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    requested: AtomicBool,
    status: AtomicU8,
}

/// Cloneable handle for requesting cancellation from any thread or task.
///
/// Cancelling is idempotent and does nothing once the runner has reached a
/// terminal status. Poll loops and the runner observe the request at their
/// next check; in-flight provider calls are never interrupted.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    /// Creates a handle in the [`RunnerStatus::Idle`] state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        if self.status().is_terminal() {
            return;
        }
        if !self.shared.requested.swap(true, Ordering::SeqCst) {
            tracing::info!("cancellation requested");
        }
    }

    /// Returns `true` once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.requested.load(Ordering::SeqCst)
    }

    /// Current runner status.
    #[must_use]
    pub fn status(&self) -> RunnerStatus {
        RunnerStatus::from_u8(self.shared.status.load(Ordering::SeqCst))
    }

    pub(crate) fn set_status(&self, status: RunnerStatus) {
        self.shared.status.store(status.to_u8(), Ordering::SeqCst);
    }
}
