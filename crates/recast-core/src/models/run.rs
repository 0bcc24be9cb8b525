//! Run document and lifecycle enums.
//!
//! A run is one end-to-end execution of the pipeline for one uploaded audio
//! file. The orchestrator exclusively owns `status` and the two phase
//! statuses; each generation task exclusively owns its own entry in
//! `task_statuses` and its artifact/error slot. Completed and Failed are
//! terminal: no writer may mutate a terminal run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{FatalError, TaskFailure};
use crate::models::artifact::ArtifactSet;
use crate::models::transcript::Transcript;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl RunStatus {
    /// Completed and Failed are absorbing; nothing may mutate the run after.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl Display for RunStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RunStatus::Uploaded => write!(f, "uploaded"),
            RunStatus::Processing => write!(f, "processing"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(RunStatus::Uploaded),
            "processing" => Ok(RunStatus::Processing),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid run status: {}", s)),
        }
    }
}

/// Lifecycle marker shared by the two phases and the six tasks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl PhaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseStatus::Completed | PhaseStatus::Failed)
    }
}

impl Display for PhaseStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PhaseStatus::Pending => write!(f, "pending"),
            PhaseStatus::Running => write!(f, "running"),
            PhaseStatus::Completed => write!(f, "completed"),
            PhaseStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for PhaseStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PhaseStatus::Pending),
            "running" => Ok(PhaseStatus::Running),
            "completed" => Ok(PhaseStatus::Completed),
            "failed" => Ok(PhaseStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid phase status: {}", s)),
        }
    }
}

/// Task statuses share the phase lifecycle; the alias keeps call sites honest
/// about which axis they are on.
pub type TaskStatus = PhaseStatus;

/// The six generation tasks. Symmetric and unordered: they become Running
/// together and settle in any order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TaskKind {
    KeyMoments,
    Summary,
    SocialPosts,
    Titles,
    Hashtags,
    YoutubeTimestamps,
}

impl TaskKind {
    pub const ALL: [TaskKind; 6] = [
        TaskKind::KeyMoments,
        TaskKind::Summary,
        TaskKind::SocialPosts,
        TaskKind::Titles,
        TaskKind::Hashtags,
        TaskKind::YoutubeTimestamps,
    ];

    /// Stable step id for the durable step wrapping this task.
    pub fn step_id(&self) -> String {
        format!("generate:{}", self)
    }
}

impl Display for TaskKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskKind::KeyMoments => write!(f, "keyMoments"),
            TaskKind::Summary => write!(f, "summary"),
            TaskKind::SocialPosts => write!(f, "socialPosts"),
            TaskKind::Titles => write!(f, "titles"),
            TaskKind::Hashtags => write!(f, "hashtags"),
            TaskKind::YoutubeTimestamps => write!(f, "youtubeTimestamps"),
        }
    }
}

impl FromStr for TaskKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keyMoments" => Ok(TaskKind::KeyMoments),
            "summary" => Ok(TaskKind::Summary),
            "socialPosts" => Ok(TaskKind::SocialPosts),
            "titles" => Ok(TaskKind::Titles),
            "hashtags" => Ok(TaskKind::Hashtags),
            "youtubeTimestamps" => Ok(TaskKind::YoutubeTimestamps),
            _ => Err(anyhow::anyhow!("Invalid task kind: {}", s)),
        }
    }
}

/// One execution of the pipeline for one uploaded input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    /// Opaque dereferenceable locator for the source audio.
    pub input_ref: String,
    pub status: RunStatus,
    pub transcription: PhaseStatus,
    pub generation: PhaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Transcript>,
    #[serde(default)]
    pub artifacts: ArtifactSet,
    #[serde(default)]
    pub task_statuses: BTreeMap<TaskKind, TaskStatus>,
    #[serde(default)]
    pub task_errors: BTreeMap<TaskKind, TaskFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FatalError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Run {
    pub fn new(id: Uuid, input_ref: impl Into<String>) -> Self {
        let now = Utc::now();
        let task_statuses = TaskKind::ALL
            .into_iter()
            .map(|k| (k, PhaseStatus::Pending))
            .collect();
        Self {
            id,
            input_ref: input_ref.into(),
            status: RunStatus::Uploaded,
            transcription: PhaseStatus::Pending,
            generation: PhaseStatus::Pending,
            transcript: None,
            artifacts: ArtifactSet::default(),
            task_statuses,
            task_errors: BTreeMap::new(),
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// All six tasks have settled (completed or failed).
    pub fn all_tasks_settled(&self) -> bool {
        TaskKind::ALL.iter().all(|k| {
            self.task_statuses
                .get(k)
                .map(|s| s.is_terminal())
                .unwrap_or(false)
        })
    }
}

/// Field-level merge patch for a run document. Unset fields are left
/// untouched by the store; map fields merge entry-wise. One patch call is
/// one atomic write: no observer sees a subset of its fields applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<PhaseStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<PhaseStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Transcript>,
    /// Merged into the existing artifact set; only populated slots move.
    #[serde(default, skip_serializing_if = "ArtifactSet::is_empty")]
    pub artifacts: ArtifactSet,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub task_statuses: BTreeMap<TaskKind, TaskStatus>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub task_errors: BTreeMap<TaskKind, TaskFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FatalError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn transcription(mut self, status: PhaseStatus) -> Self {
        self.transcription = Some(status);
        self
    }

    pub fn generation(mut self, status: PhaseStatus) -> Self {
        self.generation = Some(status);
        self
    }

    pub fn transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn task_status(mut self, kind: TaskKind, status: TaskStatus) -> Self {
        self.task_statuses.insert(kind, status);
        self
    }

    pub fn task_error(mut self, kind: TaskKind, failure: TaskFailure) -> Self {
        self.task_errors.insert(kind, failure);
        self
    }

    pub fn error(mut self, error: FatalError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.transcription.is_none()
            && self.generation.is_none()
            && self.transcript.is_none()
            && self.artifacts.is_empty()
            && self.task_statuses.is_empty()
            && self.task_errors.is_empty()
            && self.error.is_none()
            && self.completed_at.is_none()
    }

    /// Apply this patch to an in-memory run, bumping `updated_at`.
    /// Store implementations with native field-merge express the same
    /// semantics in a single statement instead.
    pub fn apply(self, run: &mut Run) {
        if let Some(status) = self.status {
            run.status = status;
        }
        if let Some(s) = self.transcription {
            run.transcription = s;
        }
        if let Some(s) = self.generation {
            run.generation = s;
        }
        if let Some(t) = self.transcript {
            run.transcript = Some(t);
        }
        run.artifacts.merge(self.artifacts);
        for (kind, status) in self.task_statuses {
            run.task_statuses.insert(kind, status);
        }
        for (kind, failure) in self.task_errors {
            run.task_errors.insert(kind, failure);
        }
        if let Some(e) = self.error {
            run.error = Some(e);
        }
        if let Some(at) = self.completed_at {
            run.completed_at = Some(at);
        }
        run.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::artifact::{GeneratedArtifact, HashtagSet};

    #[test]
    fn task_kind_display_round_trips() {
        for kind in TaskKind::ALL {
            assert_eq!(kind.to_string().parse::<TaskKind>().unwrap(), kind);
        }
        assert!("invalid_kind".parse::<TaskKind>().is_err());
    }

    #[test]
    fn run_status_from_str() {
        assert_eq!("uploaded".parse::<RunStatus>().unwrap(), RunStatus::Uploaded);
        assert_eq!("failed".parse::<RunStatus>().unwrap(), RunStatus::Failed);
        assert!("bogus".parse::<RunStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Processing.is_terminal());
        assert!(!RunStatus::Uploaded.is_terminal());
    }

    #[test]
    fn new_run_starts_pending_everywhere() {
        let run = Run::new(Uuid::new_v4(), "s3://bucket/audio.mp3");
        assert_eq!(run.status, RunStatus::Uploaded);
        assert_eq!(run.transcription, PhaseStatus::Pending);
        assert_eq!(run.generation, PhaseStatus::Pending);
        assert_eq!(run.task_statuses.len(), 6);
        assert!(run
            .task_statuses
            .values()
            .all(|s| *s == PhaseStatus::Pending));
        assert!(!run.all_tasks_settled());
    }

    #[test]
    fn patch_leaves_unset_fields_untouched() {
        let mut run = Run::new(Uuid::new_v4(), "s3://bucket/a.mp3");
        run.artifacts
            .insert(GeneratedArtifact::Hashtags(HashtagSet {
                tags: vec!["#audio".into()],
                degraded: false,
            }));

        let patch = RunPatch::new()
            .status(RunStatus::Processing)
            .task_status(TaskKind::Summary, PhaseStatus::Running);
        patch.apply(&mut run);

        assert_eq!(run.status, RunStatus::Processing);
        assert_eq!(
            run.task_statuses[&TaskKind::Summary],
            PhaseStatus::Running
        );
        // Untouched fields survive the patch.
        assert!(run.artifacts.hashtags.is_some());
        assert_eq!(run.transcription, PhaseStatus::Pending);
        assert_eq!(
            run.task_statuses[&TaskKind::Titles],
            PhaseStatus::Pending
        );
    }

    #[test]
    fn all_tasks_settled_mixes_completed_and_failed() {
        let mut run = Run::new(Uuid::new_v4(), "ref");
        for kind in TaskKind::ALL {
            run.task_statuses.insert(kind, PhaseStatus::Completed);
        }
        run.task_statuses
            .insert(TaskKind::Titles, PhaseStatus::Failed);
        assert!(run.all_tasks_settled());
    }
}
