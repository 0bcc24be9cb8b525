//! YouTube timestamps task.
//!
//! The one task with a hard precondition: chapter-boundary data must exist.
//! With no chapters there is nothing truthful to generate, so the task
//! raises before ever calling the model, and a malformed model response is
//! raised rather than degraded — fabricated timestamps are worse than none.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use recast_core::models::{GeneratedArtifact, TaskKind, TimestampEntry, Transcript};
use recast_core::step_error::StepError;
use recast_providers::CompletionClient;

use crate::task::GenerationTask;

pub struct YoutubeTimestampsTask {
    client: Arc<dyn CompletionClient>,
}

impl YoutubeTimestampsTask {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    fn response_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "entries": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "start_secs": { "type": "integer", "minimum": 0 },
                            "label": { "type": "string" },
                        },
                        "required": ["start_secs", "label"],
                    },
                    "minItems": 1,
                },
            },
            "required": ["entries"],
        })
    }

    /// YouTube rejects chapter lists that do not start at 0:00 or run
    /// backwards; a response violating either is malformed.
    fn validate(entries: &[TimestampEntry]) -> Result<(), anyhow::Error> {
        let first = entries
            .first()
            .ok_or_else(|| anyhow::anyhow!("timestamp list is empty"))?;
        if first.start_secs != 0 {
            anyhow::bail!("first timestamp must start at 0:00, got {}", first.start_secs);
        }
        for pair in entries.windows(2) {
            if pair[1].start_secs <= pair[0].start_secs {
                anyhow::bail!("timestamps must be strictly increasing");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TimestampsResponse {
    entries: Vec<TimestampEntry>,
}

#[async_trait]
impl GenerationTask for YoutubeTimestampsTask {
    fn kind(&self) -> TaskKind {
        TaskKind::YoutubeTimestamps
    }

    async fn generate(&self, transcript: &Transcript) -> Result<GeneratedArtifact, StepError> {
        let chapters = transcript.chapters();
        if chapters.is_empty() {
            // Hard precondition: no chapter data, nothing to anchor
            // timestamps to. Raise without calling the model.
            return Err(StepError::unrecoverable(anyhow::anyhow!(
                "Transcript has no chapters; cannot generate YouTube timestamps"
            )));
        }

        let outline: Vec<String> = chapters
            .iter()
            .map(|c| format!("- [{}s] {}: {}", c.start_ms / 1000, c.headline, c.summary))
            .collect();
        let prompt = format!(
            "Turn these detected chapters into a YouTube chapter list. The \
             first entry must start at 0 seconds and entries must be in \
             ascending order. Keep labels under 50 characters.\n\n\
             Chapters:\n{}",
            outline.join("\n")
        );

        let raw = self
            .client
            .complete(&prompt, &Self::response_schema())
            .await?;

        let parsed: TimestampsResponse = serde_json::from_value(raw).map_err(|e| {
            StepError::recoverable(anyhow::anyhow!(
                "Timestamp response failed schema validation: {}",
                e
            ))
        })?;

        Self::validate(&parsed.entries).map_err(StepError::recoverable)?;

        Ok(GeneratedArtifact::YoutubeTimestamps(parsed.entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{transcript_with_chapters, StubCompletion};

    #[tokio::test]
    async fn parses_valid_chapter_list() {
        let stub = Arc::new(StubCompletion::returning(json!({
            "entries": [
                {"start_secs": 0, "label": "Intro"},
                {"start_secs": 95, "label": "Main topic"},
                {"start_secs": 260, "label": "Wrap up"},
            ]
        })));
        let task = YoutubeTimestampsTask::new(stub.clone());

        let artifact = task.generate(&transcript_with_chapters(3)).await.unwrap();
        match artifact {
            GeneratedArtifact::YoutubeTimestamps(entries) => {
                assert_eq!(entries.len(), 3);
                assert_eq!(entries[0].start_secs, 0);
            }
            other => panic!("unexpected artifact: {:?}", other),
        }
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn no_chapters_raises_without_calling_model() {
        let stub = Arc::new(StubCompletion::returning(json!({"entries": []})));
        let task = YoutubeTimestampsTask::new(stub.clone());

        let err = task
            .generate(&transcript_with_chapters(0))
            .await
            .unwrap_err();
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("no chapters"));
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_response_raises_instead_of_degrading() {
        let stub = Arc::new(StubCompletion::returning(json!({"nonsense": true})));
        let task = YoutubeTimestampsTask::new(stub);

        let err = task
            .generate(&transcript_with_chapters(4))
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("schema validation"));
    }

    #[tokio::test]
    async fn nonzero_first_entry_is_rejected() {
        let stub = Arc::new(StubCompletion::returning(json!({
            "entries": [
                {"start_secs": 10, "label": "Late start"},
                {"start_secs": 60, "label": "Next"},
            ]
        })));
        let task = YoutubeTimestampsTask::new(stub);

        let err = task
            .generate(&transcript_with_chapters(2))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("0:00"));
    }

    #[tokio::test]
    async fn non_increasing_entries_are_rejected() {
        let stub = Arc::new(StubCompletion::returning(json!({
            "entries": [
                {"start_secs": 0, "label": "Intro"},
                {"start_secs": 120, "label": "Topic"},
                {"start_secs": 60, "label": "Backwards"},
            ]
        })));
        let task = YoutubeTimestampsTask::new(stub);

        assert!(task.generate(&transcript_with_chapters(3)).await.is_err());
    }
}
