//! Shared fixtures and a stub completion client for task tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use recast_core::models::{Chapter, Segment, Transcript, Utterance, Word};
use recast_core::step_error::StepError;
use recast_providers::CompletionClient;

/// Stub completion client that replays a fixed response and counts calls.
pub struct StubCompletion {
    response: Mutex<serde_json::Value>,
    fail_with: Option<fn() -> StepError>,
    calls: AtomicUsize,
}

impl StubCompletion {
    pub fn returning(value: serde_json::Value) -> Self {
        Self {
            response: Mutex::new(value),
            fail_with: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(factory: fn() -> StepError) -> Self {
        Self {
            response: Mutex::new(serde_json::Value::Null),
            fail_with: Some(factory),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for StubCompletion {
    async fn complete(
        &self,
        _prompt: &str,
        _response_schema: &serde_json::Value,
    ) -> Result<serde_json::Value, StepError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(factory) = self.fail_with {
            return Err(factory());
        }
        Ok(self.response.lock().expect("stub lock").clone())
    }
}

/// A transcript with `chapter_count` chapters, two speakers, and word-level
/// timing, resembling the vendor mapping's output.
pub fn transcript_with_chapters(chapter_count: usize) -> Transcript {
    let chapters: Vec<Chapter> = (0..chapter_count)
        .map(|i| Chapter {
            start_ms: (i as u64) * 60_000,
            end_ms: (i as u64 + 1) * 60_000,
            headline: format!("Chapter {}", i + 1),
            summary: format!("What happens in chapter {}", i + 1),
        })
        .collect();

    Transcript {
        text: "Welcome to the show. Today we talk about shipping software.".into(),
        segments: vec![Segment {
            start_ms: 0,
            end_ms: 4_000,
            text: "Welcome to the show.".into(),
            words: vec![
                Word { text: "Welcome".into(), start_ms: 0, end_ms: 500 },
                Word { text: "to".into(), start_ms: 550, end_ms: 700 },
                Word { text: "the".into(), start_ms: 750, end_ms: 900 },
                Word { text: "show.".into(), start_ms: 950, end_ms: 1_400 },
            ],
        }],
        utterances: Some(vec![
            Utterance {
                speaker: "A".into(),
                text: "Welcome to the show.".into(),
                start_ms: 0,
                end_ms: 4_000,
            },
            Utterance {
                speaker: "B".into(),
                text: "Glad to be here.".into(),
                start_ms: 4_100,
                end_ms: 6_000,
            },
        ]),
        chapters: if chapters.is_empty() { None } else { Some(chapters) },
    }
}
