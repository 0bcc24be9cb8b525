//! Social posts task.
//!
//! Short-form posts carry a hard 280-character ceiling. Over-length model
//! output is truncated deterministically (prefix plus marker) instead of
//! rejecting the artifact.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use recast_core::models::{
    truncate_post, GeneratedArtifact, SocialPosts, TaskKind, Transcript, MAX_POST_UNITS,
};
use recast_core::step_error::StepError;
use recast_providers::CompletionClient;

use crate::task::{transcript_context, GenerationTask};

pub struct SocialPostsTask {
    client: Arc<dyn CompletionClient>,
}

impl SocialPostsTask {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    fn response_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "short_posts": {
                    "type": "array",
                    "items": { "type": "string", "maxLength": MAX_POST_UNITS },
                    "minItems": 1,
                },
                "long_post": { "type": "string" },
            },
            "required": ["short_posts", "long_post"],
        })
    }

    fn degraded(transcript: &Transcript) -> SocialPosts {
        let teaser: String = transcript.text.chars().take(200).collect();
        SocialPosts {
            short_posts: vec![truncate_post(&format!("New episode: {}", teaser))],
            long_post: "Post generation failed validation; placeholder shown.".into(),
            degraded: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostsResponse {
    short_posts: Vec<String>,
    long_post: String,
}

#[async_trait]
impl GenerationTask for SocialPostsTask {
    fn kind(&self) -> TaskKind {
        TaskKind::SocialPosts
    }

    async fn generate(&self, transcript: &Transcript) -> Result<GeneratedArtifact, StepError> {
        let prompt = format!(
            "Write 3 short promotional posts (280 characters max each) and one \
             long-form post announcing this episode.\n\n{}",
            transcript_context(transcript)
        );

        let raw = self
            .client
            .complete(&prompt, &Self::response_schema())
            .await?;

        let posts = match serde_json::from_value::<PostsResponse>(raw) {
            Ok(parsed) if !parsed.short_posts.is_empty() => SocialPosts {
                short_posts: parsed
                    .short_posts
                    .iter()
                    .map(|p| truncate_post(p))
                    .collect(),
                long_post: parsed.long_post,
                degraded: false,
            },
            Ok(_) | Err(_) => {
                tracing::warn!(task = %self.kind(), "Model response failed validation, degrading");
                Self::degraded(transcript)
            }
        };

        Ok(GeneratedArtifact::SocialPosts(posts))
    }
}
