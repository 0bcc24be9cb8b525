//! Recast pipeline engine.
//!
//! Four pieces, leaves first: the durable step executor (checkpointed,
//! replay-safe units of work), the result merge gate, the progress hub
//! (per-run broadcast of phase transitions), and the orchestrator that
//! sequences transcription, fans out the six generation tasks, and joins.

pub mod merge;
pub mod orchestrator;
pub mod progress;
pub mod step;

pub use merge::GenerationOutcome;
pub use orchestrator::{ContentPipeline, RunOutcome};
pub use progress::{ChannelGrant, ProgressHub, ProgressSubscription, ProgressTokenIssuer};
pub use step::{RetryPolicy, StepExecutor, StepFailure};
