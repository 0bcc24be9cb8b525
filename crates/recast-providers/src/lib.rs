//! External collaborator clients.
//!
//! Both collaborators are plain HTTP vendors wrapped behind traits so the
//! pipeline and tasks never see a concrete transport: the speech-to-text
//! vendor produces the Transcript, the completion model answers one
//! schema-constrained call per generation-task attempt. Clients are
//! constructed explicitly at bootstrap and injected; no module-level
//! singletons.

pub mod completion;
pub mod transcription;

pub use completion::{CompletionClient, StructuredCompletionClient};
pub use transcription::{SpeechApiClient, TranscriptionProvider};
