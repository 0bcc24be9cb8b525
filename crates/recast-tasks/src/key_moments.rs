//! Key moments task: timestamped highlights worth clipping.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use recast_core::models::{GeneratedArtifact, KeyMoment, TaskKind, Transcript};
use recast_core::step_error::StepError;
use recast_providers::CompletionClient;

use crate::task::{transcript_context, GenerationTask};

pub struct KeyMomentsTask {
    client: Arc<dyn CompletionClient>,
}

impl KeyMomentsTask {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    fn response_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "moments": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "start_ms": { "type": "integer", "minimum": 0 },
                            "description": { "type": "string" },
                        },
                        "required": ["title", "start_ms", "description"],
                    },
                },
            },
            "required": ["moments"],
        })
    }

    /// Deterministic fallback: chapter boundaries become the moments; with
    /// no chapters, the opening segment is the single moment.
    fn degraded(transcript: &Transcript) -> Vec<KeyMoment> {
        let chapters = transcript.chapters();
        if !chapters.is_empty() {
            return chapters
                .iter()
                .map(|c| KeyMoment {
                    title: c.headline.clone(),
                    start_ms: c.start_ms,
                    description: format!("Auto-derived from chapter boundary: {}", c.summary),
                })
                .collect();
        }
        vec![KeyMoment {
            title: "Episode start".into(),
            start_ms: 0,
            description: "Auto-derived placeholder; moment generation failed validation.".into(),
        }]
    }
}

#[derive(Debug, Deserialize)]
struct MomentsResponse {
    moments: Vec<KeyMoment>,
}

#[async_trait]
impl GenerationTask for KeyMomentsTask {
    fn kind(&self) -> TaskKind {
        TaskKind::KeyMoments
    }

    async fn generate(&self, transcript: &Transcript) -> Result<GeneratedArtifact, StepError> {
        let prompt = format!(
            "Identify the 3 to 8 most compelling moments of this episode for \
             short-form clips. Timestamps are milliseconds from the start.\n\n{}",
            transcript_context(transcript)
        );

        let raw = self
            .client
            .complete(&prompt, &Self::response_schema())
            .await?;

        let moments = match serde_json::from_value::<MomentsResponse>(raw) {
            Ok(parsed) if !parsed.moments.is_empty() => parsed.moments,
            Ok(_) | Err(_) => {
                tracing::warn!(task = %self.kind(), "Model response failed validation, degrading");
                Self::degraded(transcript)
            }
        };

        Ok(GeneratedArtifact::KeyMoments(moments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{transcript_with_chapters, StubCompletion};

    #[tokio::test]
    async fn parses_valid_response() {
        let stub = Arc::new(StubCompletion::returning(json!({
            "moments": [
                {"title": "Hot take", "start_ms": 120000, "description": "A spicy opinion"},
            ]
        })));
        let task = KeyMomentsTask::new(stub.clone());

        let artifact = task
            .generate(&transcript_with_chapters(3))
            .await
            .unwrap();
        match artifact {
            GeneratedArtifact::KeyMoments(moments) => {
                assert_eq!(moments.len(), 1);
                assert_eq!(moments[0].start_ms, 120_000);
            }
            other => panic!("unexpected artifact: {:?}", other),
        }
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn malformed_response_degrades_to_chapter_moments() {
        let stub = Arc::new(StubCompletion::returning(json!({"wrong": "shape"})));
        let task = KeyMomentsTask::new(stub);

        let artifact = task
            .generate(&transcript_with_chapters(4))
            .await
            .unwrap();
        match artifact {
            GeneratedArtifact::KeyMoments(moments) => {
                assert_eq!(moments.len(), 4);
                assert!(moments[0].description.contains("Auto-derived"));
            }
            other => panic!("unexpected artifact: {:?}", other),
        }
    }

    #[tokio::test]
    async fn provider_error_propagates() {
        let stub = Arc::new(StubCompletion::failing(|| {
            StepError::recoverable(anyhow::anyhow!("rate limited"))
        }));
        let task = KeyMomentsTask::new(stub);
        let err = task
            .generate(&transcript_with_chapters(1))
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
    }
}
