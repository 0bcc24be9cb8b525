//! In-memory store for tests and local development.
//!
//! Same contract as the Postgres implementation: patches apply atomically
//! under one lock hold, terminal runs reject writes, checkpoints are
//! insert-once.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use recast_core::models::{Run, RunPatch, RunStatus};

use crate::store::{CheckpointStore, RunStore, StepCheckpoint};

#[derive(Default)]
pub struct MemoryStore {
    runs: Mutex<HashMap<Uuid, Run>>,
    checkpoints: Mutex<HashMap<(Uuid, String), StepCheckpoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded checkpoints, for replay assertions in tests.
    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.lock().expect("checkpoint lock").len()
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn insert(&self, run: &Run) -> Result<()> {
        let mut runs = self.runs.lock().expect("run lock");
        if runs.contains_key(&run.id) {
            anyhow::bail!("Run already exists: {}", run.id);
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn get(&self, run_id: Uuid) -> Result<Option<Run>> {
        Ok(self.runs.lock().expect("run lock").get(&run_id).cloned())
    }

    async fn list(
        &self,
        status: Option<RunStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Run>> {
        let runs = self.runs.lock().expect("run lock");
        let mut matching: Vec<Run> = runs
            .values()
            .filter(|r| status.map(|s| r.status == s).unwrap_or(true))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn patch(&self, run_id: Uuid, patch: RunPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut runs = self.runs.lock().expect("run lock");
        let run = runs
            .get_mut(&run_id)
            .ok_or_else(|| anyhow::anyhow!("Run not found: {}", run_id))?;
        if run.is_terminal() {
            anyhow::bail!(
                "Run {} is terminal ({}) and cannot be patched",
                run_id,
                run.status
            );
        }
        patch.apply(run);
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load(&self, run_id: Uuid, step_id: &str) -> Result<Option<StepCheckpoint>> {
        Ok(self
            .checkpoints
            .lock()
            .expect("checkpoint lock")
            .get(&(run_id, step_id.to_string()))
            .cloned())
    }

    async fn record(&self, checkpoint: StepCheckpoint) -> Result<StepCheckpoint> {
        let mut checkpoints = self.checkpoints.lock().expect("checkpoint lock");
        let key = (checkpoint.run_id, checkpoint.step_id.clone());
        // First writer wins, matching the Postgres ON CONFLICT DO NOTHING.
        Ok(checkpoints.entry(key).or_insert(checkpoint).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CheckpointOutcome;
    use recast_core::error::TaskFailure;
    use recast_core::models::{PhaseStatus, TaskKind};
    use serde_json::json;

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = MemoryStore::new();
        let run = Run::new(Uuid::new_v4(), "s3://audio/ep1.mp3");
        store.insert(&run).await.unwrap();

        let loaded = store.get(run.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, run.id);
        assert_eq!(loaded.input_ref, "s3://audio/ep1.mp3");
        assert_eq!(loaded.status, RunStatus::Uploaded);
    }

    #[tokio::test]
    async fn duplicate_insert_rejected() {
        let store = MemoryStore::new();
        let run = Run::new(Uuid::new_v4(), "ref");
        store.insert(&run).await.unwrap();
        assert!(store.insert(&run).await.is_err());
    }

    #[tokio::test]
    async fn patch_merges_maps_entry_wise() {
        let store = MemoryStore::new();
        let run = Run::new(Uuid::new_v4(), "ref");
        store.insert(&run).await.unwrap();

        store
            .patch(
                run.id,
                RunPatch::new().task_status(TaskKind::Summary, PhaseStatus::Running),
            )
            .await
            .unwrap();
        store
            .patch(
                run.id,
                RunPatch::new()
                    .task_status(TaskKind::Titles, PhaseStatus::Running)
                    .task_error(TaskKind::Hashtags, TaskFailure::new("hashtags", "boom")),
            )
            .await
            .unwrap();

        let loaded = store.get(run.id).await.unwrap().unwrap();
        assert_eq!(loaded.task_statuses[&TaskKind::Summary], PhaseStatus::Running);
        assert_eq!(loaded.task_statuses[&TaskKind::Titles], PhaseStatus::Running);
        assert_eq!(loaded.task_errors[&TaskKind::Hashtags].message, "boom");
    }

    #[tokio::test]
    async fn terminal_run_rejects_patch() {
        let store = MemoryStore::new();
        let run = Run::new(Uuid::new_v4(), "ref");
        store.insert(&run).await.unwrap();
        store
            .patch(run.id, RunPatch::new().status(RunStatus::Failed))
            .await
            .unwrap();

        let err = store
            .patch(run.id, RunPatch::new().status(RunStatus::Processing))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("terminal"));
    }

    #[tokio::test]
    async fn patch_missing_run_errors() {
        let store = MemoryStore::new();
        let err = store
            .patch(Uuid::new_v4(), RunPatch::new().status(RunStatus::Processing))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn checkpoint_first_writer_wins() {
        let store = MemoryStore::new();
        let run_id = Uuid::new_v4();

        let first = StepCheckpoint::settled(
            run_id,
            "transcription",
            CheckpointOutcome::Ok { value: json!({"text": "a"}) },
        );
        let second = StepCheckpoint::settled(
            run_id,
            "transcription",
            CheckpointOutcome::Ok { value: json!({"text": "b"}) },
        );

        store.record(first).await.unwrap();
        let stored = store.record(second).await.unwrap();
        match stored.outcome {
            CheckpointOutcome::Ok { value } => assert_eq!(value, json!({"text": "a"})),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(store.checkpoint_count(), 1);
    }

    #[tokio::test]
    async fn checkpoints_are_scoped_per_run() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store
            .record(StepCheckpoint::settled(
                a,
                "transcription",
                CheckpointOutcome::Ok { value: json!(1) },
            ))
            .await
            .unwrap();

        assert!(store.load(b, "transcription").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let store = MemoryStore::new();
        let run_a = Run::new(Uuid::new_v4(), "a");
        let run_b = Run::new(Uuid::new_v4(), "b");
        store.insert(&run_a).await.unwrap();
        store.insert(&run_b).await.unwrap();
        store
            .patch(run_b.id, RunPatch::new().status(RunStatus::Processing))
            .await
            .unwrap();

        let processing = store
            .list(Some(RunStatus::Processing), 10, 0)
            .await
            .unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, run_b.id);

        let all = store.list(None, 10, 0).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
