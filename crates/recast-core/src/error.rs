//! Error types module
//!
//! The pipeline distinguishes fatal errors (transcription or persistence
//! failure, which abort the run) from isolated per-task failures (recorded in
//! the run's error map without aborting). Transient errors never reach these
//! types; they are absorbed by the step executor's retry policy and only
//! surface here once the retry budget is exhausted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Step name recorded when transcription aborts the run.
pub const STEP_TRANSCRIPTION: &str = "transcription";
/// Step name recorded when the final merge write aborts the run.
pub const STEP_PERSISTENCE: &str = "persistence";

/// Fatal error record persisted on the run document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FatalError {
    pub message: String,
    pub step: String,
    pub timestamp: DateTime<Utc>,
}

impl FatalError {
    pub fn new(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            step: step.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One generation task's failure, recorded per-task in the run's error map.
/// Never aborts the run and never prevents sibling results from persisting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskFailure {
    pub message: String,
    pub step: String,
}

impl TaskFailure {
    pub fn new(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            step: step.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Run not found: {0}")]
    RunNotFound(Uuid),

    #[error("Run {run_id} is terminal ({status}) and cannot be mutated")]
    TerminalRun { run_id: Uuid, status: String },

    #[error("{step} failed: {message}")]
    Fatal { step: String, message: String },

    #[error("Store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PipelineError {
    pub fn fatal(step: &str, message: impl Into<String>) -> Self {
        Self::Fatal {
            step: step.to_string(),
            message: message.into(),
        }
    }

    /// The fatal record to persist on the run, if this error is fatal.
    pub fn as_fatal_record(&self) -> Option<FatalError> {
        match self {
            PipelineError::Fatal { step, message } => Some(FatalError::new(step, message)),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_record_carries_step_and_message() {
        let err = PipelineError::fatal(STEP_TRANSCRIPTION, "vendor timeout");
        let record = err.as_fatal_record().unwrap();
        assert_eq!(record.step, "transcription");
        assert_eq!(record.message, "vendor timeout");
    }

    #[test]
    fn non_fatal_errors_have_no_record() {
        let err = PipelineError::RunNotFound(Uuid::new_v4());
        assert!(err.as_fatal_record().is_none());
    }
}
