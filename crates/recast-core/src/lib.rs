//! Recast Core Library
//!
//! This crate provides the domain models, error types, and configuration
//! shared across all Recast components: the run document and its phase/task
//! lifecycle, the transcript produced by phase one, the six generated
//! artifact payloads, and the ephemeral progress events.

pub mod config;
pub mod error;
pub mod models;
pub mod step_error;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{FatalError, PipelineError, TaskFailure, STEP_PERSISTENCE, STEP_TRANSCRIPTION};
pub use step_error::{StepError, StepResultExt};
