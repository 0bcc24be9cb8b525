//! Postgres store implementations.
//!
//! Run documents live in one row per run; the artifact set, task-status
//! map, and task-error map are jsonb columns so a merge-patch is a single
//! UPDATE statement (jsonb `||` for entry-wise merge, COALESCE for scalar
//! fields) — one statement, no partial visibility. The terminal-run guard
//! is in the WHERE clause so it holds under concurrent writers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use recast_core::error::{FatalError, TaskFailure};
use recast_core::models::{ArtifactSet, Run, RunPatch, RunStatus, TaskKind, TaskStatus, Transcript};

use crate::store::{CheckpointOutcome, CheckpointStore, RunStore, StepCheckpoint};

const RUN_COLUMNS: &str = "id, input_ref, status, transcription_status, generation_status, \
     transcript, artifacts, task_statuses, task_errors, error, \
     created_at, updated_at, completed_at";

#[derive(Clone)]
pub struct PgRunStore {
    pool: PgPool,
}

impl PgRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn run_from_row(row: &PgRow) -> Result<Run> {
    let status: String = row.get("status");
    let transcription: String = row.get("transcription_status");
    let generation: String = row.get("generation_status");
    let transcript: Option<Json<Transcript>> = row.get("transcript");
    let artifacts: Json<ArtifactSet> = row.get("artifacts");
    let task_statuses: Json<std::collections::BTreeMap<TaskKind, TaskStatus>> =
        row.get("task_statuses");
    let task_errors: Json<std::collections::BTreeMap<TaskKind, TaskFailure>> =
        row.get("task_errors");
    let error: Option<Json<FatalError>> = row.get("error");

    Ok(Run {
        id: row.get("id"),
        input_ref: row.get("input_ref"),
        status: status
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse run status: {}", e))?,
        transcription: transcription
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse transcription status: {}", e))?,
        generation: generation
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse generation status: {}", e))?,
        transcript: transcript.map(|j| j.0),
        artifacts: artifacts.0,
        task_statuses: task_statuses.0,
        task_errors: task_errors.0,
        error: error.map(|j| j.0),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        completed_at: row.get("completed_at"),
    })
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn insert(&self, run: &Run) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO runs (
                id, input_ref, status, transcription_status, generation_status,
                transcript, artifacts, task_statuses, task_errors, error,
                created_at, updated_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(run.id)
        .bind(&run.input_ref)
        .bind(run.status.to_string())
        .bind(run.transcription.to_string())
        .bind(run.generation.to_string())
        .bind(run.transcript.as_ref().map(Json))
        .bind(Json(&run.artifacts))
        .bind(Json(&run.task_statuses))
        .bind(Json(&run.task_errors))
        .bind(run.error.as_ref().map(Json))
        .bind(run.created_at)
        .bind(run.updated_at)
        .bind(run.completed_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert run")?;
        Ok(())
    }

    async fn get(&self, run_id: Uuid) -> Result<Option<Run>> {
        let row = sqlx::query(&format!("SELECT {} FROM runs WHERE id = $1", RUN_COLUMNS))
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get run")?;
        row.as_ref().map(run_from_row).transpose()
    }

    async fn list(
        &self,
        status: Option<RunStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Run>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM runs
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            RUN_COLUMNS
        ))
        .bind(status.map(|s| s.to_string()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list runs")?;
        rows.iter().map(run_from_row).collect()
    }

    async fn patch(&self, run_id: Uuid, patch: RunPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let result = sqlx::query(
            r#"
            UPDATE runs SET
                status = COALESCE($2, status),
                transcription_status = COALESCE($3, transcription_status),
                generation_status = COALESCE($4, generation_status),
                transcript = COALESCE($5, transcript),
                artifacts = artifacts || $6,
                task_statuses = task_statuses || $7,
                task_errors = task_errors || $8,
                error = COALESCE($9, error),
                completed_at = COALESCE($10, completed_at),
                updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(run_id)
        .bind(patch.status.map(|s| s.to_string()))
        .bind(patch.transcription.map(|s| s.to_string()))
        .bind(patch.generation.map(|s| s.to_string()))
        .bind(patch.transcript.as_ref().map(Json))
        .bind(Json(&patch.artifacts))
        .bind(Json(&patch.task_statuses))
        .bind(Json(&patch.task_errors))
        .bind(patch.error.as_ref().map(Json))
        .bind(patch.completed_at)
        .execute(&self.pool)
        .await
        .context("Failed to patch run")?;

        if result.rows_affected() == 0 {
            match self.get(run_id).await? {
                Some(run) => anyhow::bail!(
                    "Run {} is terminal ({}) and cannot be patched",
                    run_id,
                    run.status
                ),
                None => anyhow::bail!("Run not found: {}", run_id),
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgCheckpointStore {
    pool: PgPool,
}

impl PgCheckpointStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn checkpoint_from_row(row: &PgRow) -> Result<StepCheckpoint> {
    let outcome: Json<CheckpointOutcome> = row.get("outcome");
    Ok(StepCheckpoint {
        run_id: row.get("run_id"),
        step_id: row.get("step_id"),
        outcome: outcome.0,
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl CheckpointStore for PgCheckpointStore {
    async fn load(&self, run_id: Uuid, step_id: &str) -> Result<Option<StepCheckpoint>> {
        let row = sqlx::query(
            r#"
            SELECT run_id, step_id, outcome, created_at
            FROM step_checkpoints
            WHERE run_id = $1 AND step_id = $2
            "#,
        )
        .bind(run_id)
        .bind(step_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get step checkpoint")?;
        row.as_ref().map(checkpoint_from_row).transpose()
    }

    async fn record(&self, checkpoint: StepCheckpoint) -> Result<StepCheckpoint> {
        // First writer wins: a concurrent replay that lost the race reads
        // back the original outcome instead of overwriting it.
        sqlx::query(
            r#"
            INSERT INTO step_checkpoints (run_id, step_id, outcome, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (run_id, step_id) DO NOTHING
            "#,
        )
        .bind(checkpoint.run_id)
        .bind(&checkpoint.step_id)
        .bind(Json(&checkpoint.outcome))
        .bind(checkpoint.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to record step checkpoint")?;

        self.load(checkpoint.run_id, &checkpoint.step_id)
            .await?
            .context("Checkpoint missing immediately after record")
    }
}
