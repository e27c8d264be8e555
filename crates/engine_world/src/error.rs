//! World-level error types.

use std::fmt;

use engine_component::{BoxError, ComponentError, Entity};

/// Errors raised by world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// An operation addressed an entity that is not active: never allocated,
    /// already reclaimed, or queued for deletion.
    #[error("cannot {operation} {entity}: entity is not active")]
    InactiveEntity {
        /// The offending entity.
        entity: Entity,
        /// What was attempted.
        operation: &'static str,
    },

    /// A component could not be created or addressed.
    #[error(transparent)]
    Component(#[from] ComponentError),

    /// The world configuration could not be parsed.
    #[error("invalid world configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// One or more systems failed to dispose.
    #[error(transparent)]
    Dispose(#[from] AggregateError),
}

/// Failures collected from independent teardown steps.
#[derive(Debug, Default)]
pub struct AggregateError {
    errors: Vec<(String, BoxError)>,
}

impl AggregateError {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure from the named step.
    pub fn push(&mut self, step: impl Into<String>, error: BoxError) {
        self.errors.push((step.into(), error));
    }

    /// Returns `true` if nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of collected failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate failures in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoxError)> {
        self.errors.iter().map(|(step, error)| (step.as_str(), error))
    }

    /// `Ok(())` if nothing failed, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), AggregateError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} teardown step(s) failed", self.errors.len())?;
        for (step, error) in &self.errors {
            write!(f, "\n  {step}: {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}
