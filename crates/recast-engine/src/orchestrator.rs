//! Pipeline orchestrator: phase sequencing, fan-out/join, failure routing.
//!
//! The orchestrator exclusively owns run-status and phase-status
//! transitions. Transcription failure and final-persistence failure abort
//! the run; a generation task's failure is isolated to its own slot and
//! never discards the other five results. Every phase transition is
//! published to the run's progress channel and recorded in the returned
//! transition log, in emission order.

use std::sync::Arc;
use uuid::Uuid;

use recast_core::error::{
    FatalError, PipelineError, TaskFailure, STEP_PERSISTENCE, STEP_TRANSCRIPTION,
};
use recast_core::models::{
    run_channel, PhaseStatus, ProgressTopic, Run, RunPatch, RunStatus, TaskKind, Transcript,
};
use recast_db::{CheckpointStore, RunStore};
use recast_providers::TranscriptionProvider;
use recast_tasks::GenerationTask;

use crate::merge::{completion_patch, GenerationOutcome};
use crate::progress::ProgressHub;
use crate::step::{RetryPolicy, StepExecutor};

/// What one `execute` call settled on, including the publisher-side
/// transition log for causal-order assertions.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub artifact_count: usize,
    pub failed_tasks: Vec<TaskKind>,
    pub transitions: Vec<(ProgressTopic, u64)>,
}

impl RunOutcome {
    fn from_run(run: &Run, transitions: Vec<(ProgressTopic, u64)>) -> Self {
        Self {
            run_id: run.id,
            status: run.status,
            artifact_count: run.artifacts.len(),
            failed_tasks: run.task_errors.keys().copied().collect(),
            transitions,
        }
    }
}

pub struct ContentPipeline {
    runs: Arc<dyn RunStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    transcriber: Arc<dyn TranscriptionProvider>,
    tasks: Vec<Arc<dyn GenerationTask>>,
    progress: Arc<ProgressHub>,
    retry: RetryPolicy,
}

impl ContentPipeline {
    pub fn new(
        runs: Arc<dyn RunStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        transcriber: Arc<dyn TranscriptionProvider>,
        tasks: Vec<Arc<dyn GenerationTask>>,
        progress: Arc<ProgressHub>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            runs,
            checkpoints,
            transcriber,
            tasks,
            progress,
            retry,
        }
    }

    pub fn progress_hub(&self) -> Arc<ProgressHub> {
        self.progress.clone()
    }

    /// Intake for the upload collaborator's trigger event. The input ref is
    /// opaque — format, size, and authorization were checked upstream.
    pub async fn create_run(
        &self,
        run_id: Option<Uuid>,
        input_ref: &str,
    ) -> Result<Run, PipelineError> {
        if input_ref.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "input_ref must not be empty".into(),
            ));
        }
        let run = Run::new(run_id.unwrap_or_else(Uuid::new_v4), input_ref);
        self.runs.insert(&run).await.map_err(PipelineError::Store)?;
        tracing::info!(run_id = %run.id, "Run created");
        Ok(run)
    }

    /// Execute (or resume) one run to a terminal status.
    ///
    /// Safe to call again after a crash or a hosting-runtime retry: settled
    /// steps replay from their checkpoints instead of re-executing, and an
    /// already-terminal run is returned as-is.
    pub async fn execute(&self, run_id: Uuid) -> Result<RunOutcome, PipelineError> {
        let run = self
            .runs
            .get(run_id)
            .await
            .map_err(PipelineError::Store)?
            .ok_or(PipelineError::RunNotFound(run_id))?;

        if run.is_terminal() {
            tracing::info!(run_id = %run_id, status = %run.status, "Run already terminal, nothing to do");
            return Ok(RunOutcome::from_run(&run, Vec::new()));
        }

        let channel = run_channel(run_id);
        let executor = StepExecutor::new(run_id, self.checkpoints.clone(), self.retry);
        let mut transitions: Vec<(ProgressTopic, u64)> = Vec::new();

        // Phase 1: transcription (single blocking durable step).
        self.apply_patch(
            run_id,
            RunPatch::new()
                .status(RunStatus::Processing)
                .transcription(PhaseStatus::Running),
        )
        .await?;
        self.emit(
            &channel,
            &mut transitions,
            ProgressTopic::TranscriptionStart,
            "Transcribing audio",
        );

        let transcript = match self.run_transcription(&executor, &run.input_ref).await {
            Ok(t) => t,
            Err(message) => {
                // Fatal: record, halt. Generation never starts and nothing
                // further is published on the channel.
                return Err(self
                    .fail_run(
                        run_id,
                        STEP_TRANSCRIPTION,
                        &message,
                        RunPatch::new().transcription(PhaseStatus::Failed),
                    )
                    .await);
            }
        };

        self.apply_patch(
            run_id,
            RunPatch::new()
                .transcript(transcript.clone())
                .transcription(PhaseStatus::Completed),
        )
        .await?;
        self.emit(
            &channel,
            &mut transitions,
            ProgressTopic::TranscriptionDone,
            "Transcript ready",
        );

        // Phase 2: fan out the six generation tasks.
        let mut generation_start = RunPatch::new().generation(PhaseStatus::Running);
        for kind in TaskKind::ALL {
            generation_start = generation_start.task_status(kind, PhaseStatus::Running);
        }
        self.apply_patch(run_id, generation_start).await?;
        self.emit(
            &channel,
            &mut transitions,
            ProgressTopic::GenerationStart,
            "Generating content",
        );

        let outcome = self.fan_out(&executor, run_id, Arc::new(transcript)).await;

        tracing::info!(
            run_id = %run_id,
            succeeded = outcome.succeeded(),
            failed = outcome.failed(),
            "Generation phase joined"
        );
        self.emit(
            &channel,
            &mut transitions,
            ProgressTopic::GenerationDone,
            format!(
                "Generation finished: {} succeeded, {} failed",
                outcome.succeeded(),
                outcome.failed()
            ),
        );

        // Terminal merge: the one atomic write of final generated content.
        let patch = completion_patch(&outcome, chrono::Utc::now());
        if let Err(e) = self.runs.patch(run_id, patch).await {
            return Err(self
                .fail_run(run_id, STEP_PERSISTENCE, &e.to_string(), RunPatch::new())
                .await);
        }

        let run = self
            .runs
            .get(run_id)
            .await
            .map_err(PipelineError::Store)?
            .ok_or(PipelineError::RunNotFound(run_id))?;
        Ok(RunOutcome::from_run(&run, transitions))
    }

    /// Transcription as one durable step; also enforces the non-empty
    /// contract against a misbehaving provider implementation.
    async fn run_transcription(
        &self,
        executor: &StepExecutor,
        input_ref: &str,
    ) -> Result<Transcript, String> {
        let transcriber = self.transcriber.clone();
        let input_ref = input_ref.to_string();
        let transcript: Transcript = executor
            .run_step(STEP_TRANSCRIPTION, move || {
                let transcriber = transcriber.clone();
                let input_ref = input_ref.clone();
                async move { transcriber.transcribe(&input_ref).await }
            })
            .await
            .map_err(|f| f.message)?;

        if transcript.is_empty() {
            return Err("Transcription produced an empty transcript".to_string());
        }
        Ok(transcript)
    }

    /// Launch all six tasks concurrently as independent durable steps and
    /// wait for every one to settle — a slow or failing task must not
    /// starve the others, and the phase is not done until all have
    /// reported. Results cross the join as values, never unwinds.
    async fn fan_out(
        &self,
        executor: &StepExecutor,
        run_id: Uuid,
        transcript: Arc<Transcript>,
    ) -> GenerationOutcome {
        let mut handles = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            let kind = task.kind();
            let task = task.clone();
            let executor = executor.clone();
            let transcript = transcript.clone();
            let runs = self.runs.clone();

            handles.push((
                kind,
                tokio::spawn(async move {
                    let step_id = kind.step_id();
                    let result = executor
                        .run_step(&step_id, move || {
                            let task = task.clone();
                            let transcript = transcript.clone();
                            async move { task.generate(&transcript).await }
                        })
                        .await;

                    // Each task owns its own status slot and flips it the
                    // moment its step settles, independent of siblings. The
                    // terminal merge re-asserts all six, so a lost write
                    // here cannot corrupt the final document.
                    let status = if result.is_ok() {
                        PhaseStatus::Completed
                    } else {
                        PhaseStatus::Failed
                    };
                    if let Err(e) = runs
                        .patch(run_id, RunPatch::new().task_status(kind, status))
                        .await
                    {
                        tracing::warn!(
                            run_id = %run_id,
                            task = %kind,
                            error = %e,
                            "Failed to record settled task status"
                        );
                    }
                    result
                }),
            ));
        }

        let mut outcome = GenerationOutcome::default();
        for (kind, handle) in handles {
            match handle.await {
                Ok(Ok(artifact)) => outcome.record_success(artifact),
                Ok(Err(failure)) => {
                    tracing::warn!(
                        run_id = %run_id,
                        task = %kind,
                        attempts = failure.attempts,
                        error = %failure.message,
                        "Generation task failed; continuing with siblings"
                    );
                    outcome.record_failure(
                        kind,
                        TaskFailure::new(failure.step_id, failure.message),
                    );
                }
                Err(join_err) => {
                    tracing::error!(run_id = %run_id, task = %kind, error = %join_err, "Generation task aborted");
                    outcome.record_failure(
                        kind,
                        TaskFailure::new(kind.step_id(), format!("Task aborted: {}", join_err)),
                    );
                }
            }
        }
        outcome
    }

    fn emit(
        &self,
        channel: &str,
        transitions: &mut Vec<(ProgressTopic, u64)>,
        topic: ProgressTopic,
        message: impl Into<String>,
    ) {
        let seq = self.progress.publish(channel, topic, message);
        transitions.push((topic, seq));
    }

    async fn apply_patch(&self, run_id: Uuid, patch: RunPatch) -> Result<(), PipelineError> {
        if let Err(e) = self.runs.patch(run_id, patch).await {
            return Err(self
                .fail_run(run_id, STEP_PERSISTENCE, &e.to_string(), RunPatch::new())
                .await);
        }
        Ok(())
    }

    /// Record a fatal failure on the run (best effort — the store may be
    /// the thing that is down) and produce the error to surface.
    async fn fail_run(
        &self,
        run_id: Uuid,
        step: &str,
        message: &str,
        extra: RunPatch,
    ) -> PipelineError {
        let patch = extra
            .status(RunStatus::Failed)
            .error(FatalError::new(step, message));
        if let Err(e) = self.runs.patch(run_id, patch).await {
            tracing::error!(run_id = %run_id, error = %e, "Failed to record fatal run failure");
        }
        tracing::error!(run_id = %run_id, step = %step, message = %message, "Run failed");
        PipelineError::fatal(step, message)
    }
}
