//! Result merge gate: the only writer of final generated content.
//!
//! After the join, everything that settled — succeeded artifacts, the
//! task-error map, the six terminal task statuses, the generation phase
//! transition, and the run's terminal status — is folded into one merge
//! patch and applied in a single store call. No observer ever sees
//! three-of-six artifacts mid-write.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use recast_core::error::TaskFailure;
use recast_core::models::{
    GeneratedArtifact, PhaseStatus, RunPatch, RunStatus, TaskKind, TaskStatus,
};

/// What the fan-out settled on: artifacts for the tasks that succeeded,
/// failures for the rest. Disjoint by construction.
#[derive(Debug, Default)]
pub struct GenerationOutcome {
    pub artifacts: Vec<GeneratedArtifact>,
    pub failures: BTreeMap<TaskKind, TaskFailure>,
}

impl GenerationOutcome {
    pub fn record_success(&mut self, artifact: GeneratedArtifact) {
        self.artifacts.push(artifact);
    }

    pub fn record_failure(&mut self, kind: TaskKind, failure: TaskFailure) {
        self.failures.insert(kind, failure);
    }

    pub fn succeeded(&self) -> usize {
        self.artifacts.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    fn task_status(&self, kind: TaskKind) -> TaskStatus {
        if self.failures.contains_key(&kind) {
            PhaseStatus::Failed
        } else {
            PhaseStatus::Completed
        }
    }
}

/// Build the single terminal merge patch for a run whose generation phase
/// has joined. Generation is Completed regardless of how many tasks failed
/// ("all attempts finished", not "all succeeded"), and the run is Completed
/// even at zero successes — callers inspect the error map for true
/// completeness.
pub fn completion_patch(outcome: &GenerationOutcome, now: DateTime<Utc>) -> RunPatch {
    let mut patch = RunPatch::new()
        .status(RunStatus::Completed)
        .generation(PhaseStatus::Completed)
        .completed_at(now);

    for artifact in &outcome.artifacts {
        patch.artifacts.insert(artifact.clone());
    }
    for kind in TaskKind::ALL {
        patch.task_statuses.insert(kind, outcome.task_status(kind));
    }
    for (kind, failure) in &outcome.failures {
        patch.task_errors.insert(*kind, failure.clone());
    }
    patch
}
