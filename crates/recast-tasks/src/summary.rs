//! Episode summary task.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use recast_core::models::{EpisodeSummary, GeneratedArtifact, TaskKind, Transcript};
use recast_core::step_error::StepError;
use recast_providers::CompletionClient;

use crate::task::{transcript_context, GenerationTask};

const DEGRADED_EXCERPT_CHARS: usize = 400;

pub struct SummaryTask {
    client: Arc<dyn CompletionClient>,
}

impl SummaryTask {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    fn response_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "tl_dr": { "type": "string" },
                "overview": { "type": "string" },
                "takeaways": { "type": "array", "items": { "type": "string" } },
            },
            "required": ["tl_dr", "overview", "takeaways"],
        })
    }

    /// Deterministic fallback: opening excerpt of the transcript, flagged.
    fn degraded(transcript: &Transcript) -> EpisodeSummary {
        let excerpt: String = transcript.text.chars().take(DEGRADED_EXCERPT_CHARS).collect();
        EpisodeSummary {
            tl_dr: excerpt,
            overview: "Summary generation failed validation; showing a transcript excerpt."
                .into(),
            takeaways: Vec::new(),
            degraded: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    tl_dr: String,
    overview: String,
    #[serde(default)]
    takeaways: Vec<String>,
}

#[async_trait]
impl GenerationTask for SummaryTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Summary
    }

    async fn generate(&self, transcript: &Transcript) -> Result<GeneratedArtifact, StepError> {
        let prompt = format!(
            "Summarize this episode: a one-sentence tl;dr, a one-paragraph \
             overview, and 3 to 6 bullet takeaways.\n\n{}",
            transcript_context(transcript)
        );

        let raw = self
            .client
            .complete(&prompt, &Self::response_schema())
            .await?;

        let summary = match serde_json::from_value::<SummaryResponse>(raw) {
            Ok(parsed) if !parsed.tl_dr.trim().is_empty() => EpisodeSummary {
                tl_dr: parsed.tl_dr,
                overview: parsed.overview,
                takeaways: parsed.takeaways,
                degraded: false,
            },
            Ok(_) | Err(_) => {
                tracing::warn!(task = %self.kind(), "Model response failed validation, degrading");
                Self::degraded(transcript)
            }
        };

        Ok(GeneratedArtifact::Summary(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{transcript_with_chapters, StubCompletion};

    #[tokio::test]
    async fn parses_valid_response() {
        let stub = Arc::new(StubCompletion::returning(json!({
            "tl_dr": "Shipping beats perfection.",
            "overview": "The hosts argue for small releases.",
            "takeaways": ["Release early", "Automate checks"],
        })));
        let task = SummaryTask::new(stub);

        let artifact = task.generate(&transcript_with_chapters(2)).await.unwrap();
        match artifact {
            GeneratedArtifact::Summary(s) => {
                assert_eq!(s.tl_dr, "Shipping beats perfection.");
                assert_eq!(s.takeaways.len(), 2);
                assert!(!s.degraded);
            }
            other => panic!("unexpected artifact: {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_tl_dr_degrades() {
        let stub = Arc::new(StubCompletion::returning(json!({
            "tl_dr": "  ",
            "overview": "",
            "takeaways": [],
        })));
        let task = SummaryTask::new(stub);

        let artifact = task.generate(&transcript_with_chapters(0)).await.unwrap();
        match artifact {
            GeneratedArtifact::Summary(s) => {
                assert!(s.degraded);
                assert!(!s.tl_dr.is_empty());
            }
            other => panic!("unexpected artifact: {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_response_degrades() {
        let stub = Arc::new(StubCompletion::returning(json!([1, 2, 3])));
        let task = SummaryTask::new(stub);

        let artifact = task.generate(&transcript_with_chapters(0)).await.unwrap();
        match artifact {
            GeneratedArtifact::Summary(s) => assert!(s.degraded),
            other => panic!("unexpected artifact: {:?}", other),
        }
    }
}
