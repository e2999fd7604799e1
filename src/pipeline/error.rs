//! Errors surfaced by the build pipeline.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::client::ClientError;

/// Errors that halt the pipeline.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BuildError {
    /// Raised when a provider call fails.
    #[error("{action} failed: {source}")]
    Remote {
        /// Operation that was attempted, for example `create server`.
        action: &'static str,
        /// Underlying client error.
        source: ClientError,
    },
    /// Raised when a provider resource does not reach the expected state in
    /// time.
    #[error("timed out after {timeout:?} waiting for {waiting_for}")]
    StateTimeout {
        /// Condition being waited for.
        waiting_for: &'static str,
        /// Ceiling that elapsed.
        timeout: Duration,
    },
    /// Raised when SSH never became reachable.
    #[error("timed out after {timeout:?} waiting for SSH on {address}: {last_error}")]
    ConnectTimeout {
        /// Address that was probed.
        address: String,
        /// Ceiling that elapsed.
        timeout: Duration,
        /// Error reported by the final attempt.
        last_error: String,
    },
    /// Raised when the configured private key cannot be parsed.
    #[error("failed to parse SSH private key: {message}")]
    KeyParse {
        /// Parser diagnostic.
        message: String,
    },
    /// Raised when the provisioning hook fails.
    #[error("provisioning failed: {message}")]
    Provision {
        /// Hook diagnostic.
        message: String,
    },
    /// Raised when the build was cancelled.
    #[error("build cancelled")]
    Cancelled,
    /// Raised when a step reads a value no earlier step recorded.
    #[error("build state is missing {key}")]
    MissingState {
        /// Name of the missing value.
        key: &'static str,
    },
}

impl BuildError {
    /// Returns a mapper that wraps a [`ClientError`] for `action`.
    #[must_use]
    pub fn remote(action: &'static str) -> impl FnOnce(ClientError) -> Self {
        move |source| Self::Remote { action, source }
    }
}

/// A cleanup failure recorded while unwinding. Never replaces the error
/// that caused the unwind.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CleanupWarning {
    /// Step whose cleanup failed.
    pub step: &'static str,
    /// What went wrong and what, if anything, needs doing by hand.
    pub message: String,
}

impl CleanupWarning {
    /// Creates a warning for `step`.
    #[must_use]
    pub fn new(step: &'static str, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }
}

impl fmt::Display for CleanupWarning {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.step, self.message)
    }
}

/// A failed build: the error that stopped it plus any cleanup warnings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildFailure {
    /// Error that halted the pipeline.
    pub error: BuildError,
    /// Problems encountered while unwinding.
    pub warnings: Vec<CleanupWarning>,
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.error)?;
        for warning in &self.warnings {
            write!(formatter, "\n  cleanup warning: {warning}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<BuildError> for BuildFailure {
    fn from(error: BuildError) -> Self {
        Self {
            error,
            warnings: Vec::new(),
        }
    }
}
