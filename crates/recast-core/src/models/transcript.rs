//! Transcript produced by the transcription phase.
//!
//! Owned exclusively by the run once written; immutable thereafter. All
//! offsets are milliseconds from the start of the audio, matching the
//! speech vendor's word-level timing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Word {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// One time-coded span of the transcript with word-level timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    #[serde(default)]
    pub words: Vec<Word>,
}

/// Speaker-attributed span, present when the vendor ran diarization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Utterance {
    pub speaker: String,
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Auto-detected chapter boundary with vendor-written headline and summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chapter {
    pub start_ms: u64,
    pub end_ms: u64,
    pub headline: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    pub text: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utterances: Option<Vec<Utterance>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapters: Option<Vec<Chapter>>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn chapters(&self) -> &[Chapter] {
        self.chapters.as_deref().unwrap_or_default()
    }

    pub fn has_chapters(&self) -> bool {
        !self.chapters().is_empty()
    }

    /// End offset of the last segment, if any.
    pub fn duration_ms(&self) -> Option<u64> {
        self.segments.last().map(|s| s.end_ms)
    }
}
