// Title ideas task.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use recast_core::models::{GeneratedArtifact, TaskKind, TitleIdeas, Transcript};
use recast_core::step_error::StepError;
use recast_providers::CompletionClient;

use crate::task::{transcript_context, GenerationTask};

pub struct TitlesTask {
    client: Arc<dyn CompletionClient>,
}

impl TitlesTask {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    fn response_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "options": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1,
                },
            },
            "required": ["options"],
        })
    }

    /// Deterministic fallback: the first chapter headline, or the opening
    /// words of the episode.
    fn degraded(transcript: &Transcript) -> TitleIdeas {
        let option = transcript
            .chapters()
            .first()
            .map(|c| c.headline.clone())
            .unwrap_or_else(|| transcript.text.chars().take(60).collect());
        TitleIdeas {
            options: vec![option],
            degraded: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TitlesResponse {
    options: Vec<String>,
}

#[async_trait]
impl GenerationTask for TitlesTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Titles
    }

    async fn generate(&self, transcript: &Transcript) -> Result<GeneratedArtifact, StepError> {
        let prompt = format!(
            "Propose 5 compelling episode titles, each under 70 characters.\n\n{}",
            transcript_context(transcript)
        );

        let raw = self
            .client
            .complete(&prompt, &Self::response_schema())
            .await?;

        let titles = match serde_json::from_value::<TitlesResponse>(raw) {
            Ok(parsed) if !parsed.options.is_empty() => TitleIdeas {
                options: parsed.options,
                degraded: false,
            },
            Ok(_) | Err(_) => {
                tracing::warn!(task = %self.kind(), "Model response failed validation, degrading");
                Self::degraded(transcript)
            }
        };

        Ok(GeneratedArtifact::Titles(titles))
    }
}
