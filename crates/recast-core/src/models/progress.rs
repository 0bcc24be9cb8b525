//! Ephemeral progress events relayed to live subscribers.
//!
//! Events are emitted once at each phase transition and never persisted or
//! replayed; a late joiner reconciles from the persisted run instead.
//! `seq` is the publisher's logical timestamp — causal order at emission,
//! not a delivery-order promise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// The four coarse phase-transition topics. No other topics exist.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ProgressTopic {
    TranscriptionStart,
    TranscriptionDone,
    GenerationStart,
    GenerationDone,
}

impl ProgressTopic {
    pub const ALL: [ProgressTopic; 4] = [
        ProgressTopic::TranscriptionStart,
        ProgressTopic::TranscriptionDone,
        ProgressTopic::GenerationStart,
        ProgressTopic::GenerationDone,
    ];
}

impl Display for ProgressTopic {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProgressTopic::TranscriptionStart => write!(f, "transcriptionStart"),
            ProgressTopic::TranscriptionDone => write!(f, "transcriptionDone"),
            ProgressTopic::GenerationStart => write!(f, "generationStart"),
            ProgressTopic::GenerationDone => write!(f, "generationDone"),
        }
    }
}

impl FromStr for ProgressTopic {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transcriptionStart" => Ok(ProgressTopic::TranscriptionStart),
            "transcriptionDone" => Ok(ProgressTopic::TranscriptionDone),
            "generationStart" => Ok(ProgressTopic::GenerationStart),
            "generationDone" => Ok(ProgressTopic::GenerationDone),
            _ => Err(anyhow::anyhow!("Invalid progress topic: {}", s)),
        }
    }
}

/// Channel name for one run's progress events. One channel per run keeps a
/// credential for one run unusable against another's events.
pub fn run_channel(run_id: Uuid) -> String {
    format!("run:{}", run_id)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    pub channel: String,
    pub topic: ProgressTopic,
    /// Small human-readable payload; a hint, never authoritative state.
    pub message: String,
    /// Publisher-side logical timestamp, monotonic within a channel.
    pub seq: u64,
    pub emitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_display_round_trips() {
        for topic in ProgressTopic::ALL {
            assert_eq!(topic.to_string().parse::<ProgressTopic>().unwrap(), topic);
        }
        assert!("somethingElse".parse::<ProgressTopic>().is_err());
    }

    #[test]
    fn channel_is_scoped_to_run() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_ne!(run_channel(a), run_channel(b));
        assert!(run_channel(a).starts_with("run:"));
    }
}
