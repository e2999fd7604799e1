//! Error types for configuration loading and validation.

use std::fmt;

use thiserror::Error;

/// A single configuration problem detected while preparing a build.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Raised when a custom boot source is requested without SSH credentials.
    #[error(
        "ssh_password or ssh_private_key must be provided when booting from os_snapshot or ipxe_url"
    )]
    MissingSshSecret,
    /// Raised when both custom boot sources are configured at once.
    #[error("os_snapshot and ipxe_url are mutually exclusive")]
    ConflictingBootSource,
    /// Raised when a duration field cannot be parsed.
    #[error("failed parsing {field} '{value}': {reason}")]
    InvalidDuration {
        /// Configuration key holding the duration.
        field: &'static str,
        /// Raw value supplied by the caller.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },
    /// Raised when the snapshot name template cannot be rendered.
    #[error("invalid snapshot_name: {0}")]
    InvalidTemplate(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

/// Every problem found by [`crate::config::BuilderConfig::prepare`].
///
/// Validation keeps going after the first failure so callers can fix all
/// problems in one pass.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValidationErrors {
    errors: Vec<ConfigError>,
}

impl ValidationErrors {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Records another problem.
    pub fn push(&mut self, error: ConfigError) {
        self.errors.push(error);
    }

    /// Returns the recorded problems in detection order.
    #[must_use]
    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }

    /// Returns `true` when no problem was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of recorded problems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` when any recorded problem satisfies `predicate`.
    #[must_use]
    pub fn contains(&self, predicate: impl Fn(&ConfigError) -> bool) -> bool {
        self.errors.iter().any(predicate)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            formatter,
            "{} configuration error(s) occurred:",
            self.errors.len()
        )?;
        for error in &self.errors {
            writeln!(formatter, "* {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ConfigError> for ValidationErrors {
    fn from(value: ConfigError) -> Self {
        Self {
            errors: vec![value],
        }
    }
}
