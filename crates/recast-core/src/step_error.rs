//! Step execution error types
//!
//! This module provides error types for durable step execution, allowing a
//! step body to indicate whether an error is recoverable (should be retried
//! by the step executor) or unrecoverable (should settle as a failure
//! immediately without retrying).

use std::fmt;

/// Step execution error that can be either recoverable or unrecoverable
#[derive(Debug)]
pub struct StepError {
    inner: anyhow::Error,
    recoverable: bool,
}

impl StepError {
    /// Create a new unrecoverable step error
    ///
    /// Unrecoverable errors settle the step immediately without retrying.
    /// Use this for errors like:
    /// - A hard precondition that cannot change on retry (no chapters in
    ///   the transcript)
    /// - Missing or invalid configuration (API keys, credentials)
    /// - A model response that failed schema validation where the task has
    ///   no graceful degradation
    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: false,
        }
    }

    /// Create a new recoverable step error
    ///
    /// Recoverable errors are retried up to the step executor's bounded
    /// attempt budget. Use this for errors like:
    /// - Transient network failures
    /// - Provider rate limiting
    /// - Vendor-side timeouts
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: true,
        }
    }

    /// Check if this error is recoverable (should be retried)
    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    /// Get the inner error
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    /// Consume self and return the inner error
    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for StepError {
    /// Default conversion from anyhow::Error creates a recoverable error
    fn from(err: anyhow::Error) -> Self {
        Self::recoverable(err)
    }
}

/// Extension trait for Result to easily create unrecoverable step errors
pub trait StepResultExt<T> {
    /// Mark this result as unrecoverable on error
    fn unrecoverable(self) -> Result<T, StepError>;
}

impl<T, E: Into<anyhow::Error>> StepResultExt<T> for Result<T, E> {
    fn unrecoverable(self) -> Result<T, StepError> {
        self.map_err(|e| StepError::unrecoverable(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecoverable_error_is_not_retried() {
        let err = StepError::unrecoverable(anyhow::anyhow!("no chapters"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn recoverable_error_is_retried() {
        let err = StepError::recoverable(anyhow::anyhow!("rate limited"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn anyhow_defaults_to_recoverable() {
        let err: StepError = anyhow::anyhow!("network").into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn result_ext_marks_unrecoverable() {
        let res: Result<(), _> = Err(anyhow::anyhow!("bad config"));
        let err = res.unrecoverable().unwrap_err();
        assert!(!err.is_recoverable());
    }
}
