//! Domain models for runs, transcripts, artifacts, and progress events.

pub mod artifact;
pub mod progress;
pub mod run;
pub mod transcript;

pub use artifact::{
    truncate_post, ArtifactSet, EpisodeSummary, GeneratedArtifact, HashtagSet, KeyMoment,
    SocialPosts, TimestampEntry, TitleIdeas, MAX_POST_UNITS, TRUNCATION_MARKER,
};
pub use progress::{run_channel, ProgressEvent, ProgressTopic};
pub use run::{PhaseStatus, Run, RunPatch, RunStatus, TaskKind, TaskStatus};
pub use transcript::{Chapter, Segment, Transcript, Utterance, Word};
