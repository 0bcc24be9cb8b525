//! Generated artifact payloads, one per generation task.
//!
//! An artifact and its task error are mutually exclusive for a given task
//! within a run: never both, never neither once the task settles. Artifacts
//! produced by schema-validation fallback carry `degraded: true` so the UI
//! can flag them instead of presenting placeholder content as real.

use serde::{Deserialize, Serialize};

use crate::models::run::TaskKind;

/// Hard length ceiling for a short-form social post, in characters.
pub const MAX_POST_UNITS: usize = 280;
/// Marker appended when a post is truncated to the ceiling.
pub const TRUNCATION_MARKER: &str = "…";

/// Deterministically truncate an over-length post to the ceiling.
///
/// The result is a prefix of the original plus the truncation marker, and
/// its character count never exceeds [`MAX_POST_UNITS`]. In-limit posts are
/// returned unchanged.
pub fn truncate_post(post: &str) -> String {
    let units = post.chars().count();
    if units <= MAX_POST_UNITS {
        return post.to_string();
    }
    let marker_units = TRUNCATION_MARKER.chars().count();
    let keep = MAX_POST_UNITS - marker_units;
    let mut truncated: String = post.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyMoment {
    pub title: String,
    pub start_ms: u64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpisodeSummary {
    pub tl_dr: String,
    pub overview: String,
    #[serde(default)]
    pub takeaways: Vec<String>,
    #[serde(default)]
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SocialPosts {
    /// Short-form posts, each within [`MAX_POST_UNITS`] characters.
    pub short_posts: Vec<String>,
    pub long_post: String,
    #[serde(default)]
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TitleIdeas {
    pub options: Vec<String>,
    #[serde(default)]
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HashtagSet {
    pub tags: Vec<String>,
    #[serde(default)]
    pub degraded: bool,
}

/// One `MM:SS title` line of a YouTube chapter list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimestampEntry {
    pub start_secs: u64,
    pub label: String,
}

impl TimestampEntry {
    /// YouTube chapter format: `H:MM:SS` past the hour, `M:SS` under it.
    pub fn display_offset(&self) -> String {
        let hours = self.start_secs / 3600;
        let minutes = (self.start_secs % 3600) / 60;
        let seconds = self.start_secs % 60;
        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{}:{:02}", minutes, seconds)
        }
    }
}

/// One of the six variant payloads, each produced by exactly one task and
/// written at most once per run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum GeneratedArtifact {
    KeyMoments(Vec<KeyMoment>),
    Summary(EpisodeSummary),
    SocialPosts(SocialPosts),
    Titles(TitleIdeas),
    Hashtags(HashtagSet),
    YoutubeTimestamps(Vec<TimestampEntry>),
}

impl GeneratedArtifact {
    pub fn kind(&self) -> TaskKind {
        match self {
            GeneratedArtifact::KeyMoments(_) => TaskKind::KeyMoments,
            GeneratedArtifact::Summary(_) => TaskKind::Summary,
            GeneratedArtifact::SocialPosts(_) => TaskKind::SocialPosts,
            GeneratedArtifact::Titles(_) => TaskKind::Titles,
            GeneratedArtifact::Hashtags(_) => TaskKind::Hashtags,
            GeneratedArtifact::YoutubeTimestamps(_) => TaskKind::YoutubeTimestamps,
        }
    }
}

/// The six artifact slots of a run document. Field-level: a merge only
/// moves populated slots, so concurrent writers of disjoint slots are safe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_moments: Option<Vec<KeyMoment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<EpisodeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_posts: Option<SocialPosts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub titles: Option<TitleIdeas>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashtags: Option<HashtagSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_timestamps: Option<Vec<TimestampEntry>>,
}

impl ArtifactSet {
    pub fn insert(&mut self, artifact: GeneratedArtifact) {
        match artifact {
            GeneratedArtifact::KeyMoments(v) => self.key_moments = Some(v),
            GeneratedArtifact::Summary(v) => self.summary = Some(v),
            GeneratedArtifact::SocialPosts(v) => self.social_posts = Some(v),
            GeneratedArtifact::Titles(v) => self.titles = Some(v),
            GeneratedArtifact::Hashtags(v) => self.hashtags = Some(v),
            GeneratedArtifact::YoutubeTimestamps(v) => self.youtube_timestamps = Some(v),
        }
    }

    pub fn contains(&self, kind: TaskKind) -> bool {
        match kind {
            TaskKind::KeyMoments => self.key_moments.is_some(),
            TaskKind::Summary => self.summary.is_some(),
            TaskKind::SocialPosts => self.social_posts.is_some(),
            TaskKind::Titles => self.titles.is_some(),
            TaskKind::Hashtags => self.hashtags.is_some(),
            TaskKind::YoutubeTimestamps => self.youtube_timestamps.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !TaskKind::ALL.iter().any(|k| self.contains(*k))
    }

    pub fn len(&self) -> usize {
        TaskKind::ALL.iter().filter(|k| self.contains(**k)).count()
    }

    /// Merge populated slots from `other` into self; empty slots of `other`
    /// leave existing values alone.
    pub fn merge(&mut self, other: ArtifactSet) {
        if let Some(v) = other.key_moments {
            self.key_moments = Some(v);
        }
        if let Some(v) = other.summary {
            self.summary = Some(v);
        }
        if let Some(v) = other.social_posts {
            self.social_posts = Some(v);
        }
        if let Some(v) = other.titles {
            self.titles = Some(v);
        }
        if let Some(v) = other.hashtags {
            self.hashtags = Some(v);
        }
        if let Some(v) = other.youtube_timestamps {
            self.youtube_timestamps = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_post_is_unchanged() {
        let post = "within limits";
        assert_eq!(truncate_post(post), post);
    }

    #[test]
    fn exactly_at_ceiling_is_unchanged() {
        let post: String = "x".repeat(MAX_POST_UNITS);
        assert_eq!(truncate_post(&post), post);
    }

    #[test]
    fn over_length_post_truncates_to_prefix_plus_marker() {
        let post: String = "a".repeat(MAX_POST_UNITS + 50);
        let truncated = truncate_post(&post);
        assert_eq!(truncated.chars().count(), MAX_POST_UNITS);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        let prefix: String = truncated
            .chars()
            .take(MAX_POST_UNITS - TRUNCATION_MARKER.chars().count())
            .collect();
        assert!(post.starts_with(&prefix));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        // Multi-byte characters must not be split.
        let post: String = "é".repeat(MAX_POST_UNITS + 10);
        let truncated = truncate_post(&post);
        assert_eq!(truncated.chars().count(), MAX_POST_UNITS);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn timestamp_display_offsets() {
        let short = TimestampEntry {
            start_secs: 75,
            label: "Intro".into(),
        };
        assert_eq!(short.display_offset(), "1:15");

        let long = TimestampEntry {
            start_secs: 3_725,
            label: "Q&A".into(),
        };
        assert_eq!(long.display_offset(), "1:02:05");
    }

    #[test]
    fn artifact_set_merge_keeps_disjoint_slots() {
        let mut set = ArtifactSet::default();
        set.insert(GeneratedArtifact::Hashtags(HashtagSet {
            tags: vec!["#pods".into()],
            degraded: false,
        }));

        let mut incoming = ArtifactSet::default();
        incoming.insert(GeneratedArtifact::Titles(TitleIdeas {
            options: vec!["Episode 1".into()],
            degraded: false,
        }));

        set.merge(incoming);
        assert_eq!(set.len(), 2);
        assert!(set.contains(TaskKind::Hashtags));
        assert!(set.contains(TaskKind::Titles));
    }

    #[test]
    fn artifact_kind_matches_variant() {
        let artifact = GeneratedArtifact::YoutubeTimestamps(vec![]);
        assert_eq!(artifact.kind(), TaskKind::YoutubeTimestamps);
    }
}
