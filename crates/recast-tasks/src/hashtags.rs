// Hashtags task.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use recast_core::models::{GeneratedArtifact, HashtagSet, TaskKind, Transcript};
use recast_core::step_error::StepError;
use recast_providers::CompletionClient;

use crate::task::{transcript_context, GenerationTask};

const MAX_TAGS: usize = 15;

pub struct HashtagsTask {
    client: Arc<dyn CompletionClient>,
}

impl HashtagsTask {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    fn response_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "tags": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1,
                },
            },
            "required": ["tags"],
        })
    }

    /// Normalize a model-proposed tag: leading '#', no inner whitespace.
    fn normalize(tag: &str) -> Option<String> {
        let cleaned: String = tag
            .trim()
            .trim_start_matches('#')
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if cleaned.is_empty() {
            return None;
        }
        Some(format!("#{}", cleaned))
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    tags: Vec<String>,
}

#[async_trait]
impl GenerationTask for HashtagsTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Hashtags
    }

    async fn generate(&self, transcript: &Transcript) -> Result<GeneratedArtifact, StepError> {
        let prompt = format!(
            "Propose up to {} discovery hashtags for this episode.\n\n{}",
            MAX_TAGS,
            transcript_context(transcript)
        );

        let raw = self
            .client
            .complete(&prompt, &Self::response_schema())
            .await?;

        let tags: Vec<String> = match serde_json::from_value::<TagsResponse>(raw) {
            Ok(parsed) => parsed
                .tags
                .iter()
                .filter_map(|t| Self::normalize(t))
                .take(MAX_TAGS)
                .collect(),
            Err(_) => Vec::new(),
        };

        let set = if tags.is_empty() {
            tracing::warn!(task = %self.kind(), "Model response failed validation, degrading");
            HashtagSet {
                tags: vec!["#podcast".into()],
                degraded: true,
            }
        } else {
            HashtagSet {
                tags,
                degraded: false,
            }
        };

        Ok(GeneratedArtifact::Hashtags(set))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{transcript_with_chapters, StubCompletion};

    #[tokio::test]
    async fn normalizes_tags() {
        let stub = Arc::new(StubCompletion::returning(json!({
            "tags": ["dev tools", "#Shipping", "  ", "rust lang"],
        })));
        let task = HashtagsTask::new(stub);

        let artifact = task.generate(&transcript_with_chapters(0)).await.unwrap();
        match artifact {
            GeneratedArtifact::Hashtags(set) => {
                assert_eq!(set.tags, vec!["#devtools", "#Shipping", "#rustlang"]);
                assert!(!set.degraded);
            }
            other => panic!("unexpected artifact: {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_response_degrades() {
        let stub = Arc::new(StubCompletion::returning(json!("not an object")));
        let task = HashtagsTask::new(stub);

        let artifact = task.generate(&transcript_with_chapters(0)).await.unwrap();
        match artifact {
            GeneratedArtifact::Hashtags(set) => {
                assert!(set.degraded);
                assert_eq!(set.tags, vec!["#podcast"]);
            }
            other => panic!("unexpected artifact: {:?}", other),
        }
    }
}
