//! Store traits: the document-store contract the pipeline is written against.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use recast_core::models::{Run, RunPatch, RunStatus};

/// Point-read, insert, and field-level merge-patch over run documents.
///
/// `patch` is atomic: a single call is one logical transaction, and no
/// reader observes a subset of its fields applied. Both implementations
/// reject patches against terminal runs (Completed/Failed are absorbing).
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn insert(&self, run: &Run) -> Result<()>;

    async fn get(&self, run_id: Uuid) -> Result<Option<Run>>;

    async fn list(
        &self,
        status: Option<RunStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Run>>;

    /// Field-level merge: unset patch fields leave stored values untouched;
    /// map fields (artifacts, task statuses, task errors) merge entry-wise.
    async fn patch(&self, run_id: Uuid, patch: RunPatch) -> Result<()>;
}

/// Settled outcome of one durable step, recorded exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckpointOutcome {
    Ok { value: serde_json::Value },
    Failed { message: String, attempts: u32 },
}

/// Checkpoint slot keyed by `(run_id, step_id)`. Step ids are stable within
/// a run; collisions across runs are distinct slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepCheckpoint {
    pub run_id: Uuid,
    pub step_id: String,
    pub outcome: CheckpointOutcome,
    pub created_at: DateTime<Utc>,
}

impl StepCheckpoint {
    pub fn settled(run_id: Uuid, step_id: impl Into<String>, outcome: CheckpointOutcome) -> Self {
        Self {
            run_id,
            step_id: step_id.into(),
            outcome,
            created_at: Utc::now(),
        }
    }
}

/// Insert-once checkpoint storage underlying the durable step executor.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, run_id: Uuid, step_id: &str) -> Result<Option<StepCheckpoint>>;

    /// Record a settled outcome. First writer wins: if a checkpoint already
    /// exists for the slot, the stored one is returned unchanged.
    async fn record(&self, checkpoint: StepCheckpoint) -> Result<StepCheckpoint>;
}
