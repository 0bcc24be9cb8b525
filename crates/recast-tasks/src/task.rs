//! Shared task contract and prompt context helpers.

use async_trait::async_trait;

use recast_core::models::{GeneratedArtifact, TaskKind, Transcript};
use recast_core::step_error::StepError;

/// Longest transcript excerpt included in a prompt. Chapters and speaker
/// structure carry the rest of the context for long episodes.
const MAX_EXCERPT_CHARS: usize = 24_000;

/// One generation task. Implementations must be pure: the transcript in,
/// an artifact or error out, one external model call per attempt, no side
/// effects beyond that call.
#[async_trait]
pub trait GenerationTask: Send + Sync {
    fn kind(&self) -> TaskKind;

    async fn generate(&self, transcript: &Transcript) -> Result<GeneratedArtifact, StepError>;
}

/// Render the transcript into prompt context: chapter outline, speaker
/// roster, and a bounded text excerpt.
pub fn transcript_context(transcript: &Transcript) -> String {
    let mut sections = Vec::new();

    let chapters = transcript.chapters();
    if !chapters.is_empty() {
        let outline: Vec<String> = chapters
            .iter()
            .map(|c| {
                format!(
                    "- [{}s] {}: {}",
                    c.start_ms / 1000,
                    c.headline,
                    c.summary
                )
            })
            .collect();
        sections.push(format!("Chapter outline:\n{}", outline.join("\n")));
    }

    if let Some(utterances) = &transcript.utterances {
        let mut speakers: Vec<&str> = utterances.iter().map(|u| u.speaker.as_str()).collect();
        speakers.sort_unstable();
        speakers.dedup();
        if !speakers.is_empty() {
            sections.push(format!("Speakers: {}", speakers.join(", ")));
        }
    }

    sections.push(format!("Transcript:\n{}", excerpt(&transcript.text)));
    sections.join("\n\n")
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= MAX_EXCERPT_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_EXCERPT_CHARS).collect();
    out.push_str("\n[transcript truncated]");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::transcript_with_chapters;

    #[test]
    fn context_includes_chapters_and_speakers() {
        let transcript = transcript_with_chapters(2);
        let context = transcript_context(&transcript);
        assert!(context.contains("Chapter outline:"));
        assert!(context.contains("Speakers: A, B"));
        assert!(context.contains("Transcript:"));
    }

    #[test]
    fn long_text_is_bounded() {
        let mut transcript = transcript_with_chapters(0);
        transcript.text = "word ".repeat(10_000);
        let context = transcript_context(&transcript);
        assert!(context.contains("[transcript truncated]"));
    }
}
