//! Durable step executor: checkpoint, retry, replay.
//!
//! A step is a named unit of work whose settled outcome is recorded before
//! it is handed back to the caller. Re-running the enclosing workflow does
//! not re-execute settled steps — the checkpoint is returned instead, for
//! failures as well as successes. Step ids are stable within one run;
//! concurrent steps have independent checkpoint slots.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

use recast_core::step_error::StepError;
use recast_db::{CheckpointOutcome, CheckpointStore, StepCheckpoint};

/// Maximum backoff between retry attempts, in seconds. Caps the exponential
/// curve so high attempt counts do not produce excessively long delays.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Backoff before retry attempt `attempt` (1-based), exponential with cap.
#[inline]
pub(crate) fn compute_retry_backoff_seconds(attempt: u32) -> u64 {
    (2_u64.pow(attempt)).min(MAX_RETRY_BACKOFF_SECS)
}

/// Bounded-retry policy for one step invocation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

/// Terminal failure of a step: the retry budget is spent (or the error was
/// unrecoverable) and the failure is checkpointed. `replayed` marks
/// failures served from an earlier invocation's checkpoint.
#[derive(Debug, Clone)]
pub struct StepFailure {
    pub step_id: String,
    pub message: String,
    pub attempts: u32,
    pub replayed: bool,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Step '{}' failed after {} attempt(s): {}",
            self.step_id, self.attempts, self.message
        )
    }
}

impl std::error::Error for StepFailure {}

/// Executes named steps against a run's checkpoint slots.
#[derive(Clone)]
pub struct StepExecutor {
    run_id: Uuid,
    checkpoints: Arc<dyn CheckpointStore>,
    policy: RetryPolicy,
}

impl StepExecutor {
    pub fn new(run_id: Uuid, checkpoints: Arc<dyn CheckpointStore>, policy: RetryPolicy) -> Self {
        Self {
            run_id,
            checkpoints,
            policy,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Execute `f` under the checkpoint slot `step_id`.
    ///
    /// Checkpoint hit: the recorded outcome is returned without invoking
    /// `f`. Miss: `f` runs, recoverable errors are retried with bounded
    /// exponential backoff, and the settled outcome is checkpointed before
    /// being returned. If a concurrent invocation settled the slot first,
    /// its outcome wins and is what the caller receives.
    pub async fn run_step<T, F, Fut>(&self, step_id: &str, f: F) -> Result<T, StepFailure>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StepError>>,
    {
        if let Some(checkpoint) = self
            .checkpoints
            .load(self.run_id, step_id)
            .await
            .map_err(|e| self.store_failure(step_id, &e))?
        {
            tracing::debug!(
                run_id = %self.run_id,
                step_id = %step_id,
                "Step checkpoint hit, replaying recorded outcome"
            );
            return self.replay(step_id, checkpoint);
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(value) => {
                    let recorded = self
                        .record(step_id, value)
                        .await
                        .map_err(|e| self.store_failure(step_id, &e))?;
                    return self.replay(step_id, recorded);
                }
                Err(err) => {
                    let retryable = err.is_recoverable() && attempt < self.policy.max_attempts;
                    if retryable {
                        let backoff_seconds = compute_retry_backoff_seconds(attempt);
                        tracing::info!(
                            run_id = %self.run_id,
                            step_id = %step_id,
                            attempt = attempt,
                            backoff_seconds = backoff_seconds,
                            error = %err,
                            "Step attempt failed, scheduling retry"
                        );
                        sleep(Duration::from_secs(backoff_seconds)).await;
                        continue;
                    }

                    tracing::error!(
                        run_id = %self.run_id,
                        step_id = %step_id,
                        attempts = attempt,
                        recoverable = err.is_recoverable(),
                        error = %err,
                        "Step failed permanently"
                    );
                    let recorded = self
                        .checkpoints
                        .record(StepCheckpoint::settled(
                            self.run_id,
                            step_id,
                            CheckpointOutcome::Failed {
                                message: err.to_string(),
                                attempts: attempt,
                            },
                        ))
                        .await
                        .map_err(|e| self.store_failure(step_id, &e))?;
                    return self.replay(step_id, recorded);
                }
            }
        }
    }

    async fn record<T: Serialize>(
        &self,
        step_id: &str,
        value: T,
    ) -> anyhow::Result<StepCheckpoint> {
        let json = serde_json::to_value(value)?;
        self.checkpoints
            .record(StepCheckpoint::settled(
                self.run_id,
                step_id,
                CheckpointOutcome::Ok { value: json },
            ))
            .await
    }

    fn replay<T: DeserializeOwned>(
        &self,
        step_id: &str,
        checkpoint: StepCheckpoint,
    ) -> Result<T, StepFailure> {
        match checkpoint.outcome {
            CheckpointOutcome::Ok { value } => {
                serde_json::from_value(value).map_err(|e| StepFailure {
                    step_id: step_id.to_string(),
                    message: format!("Checkpointed value does not deserialize: {}", e),
                    attempts: 0,
                    replayed: true,
                })
            }
            CheckpointOutcome::Failed { message, attempts } => Err(StepFailure {
                step_id: step_id.to_string(),
                message,
                attempts,
                replayed: true,
            }),
        }
    }

    fn store_failure(&self, step_id: &str, err: &anyhow::Error) -> StepFailure {
        StepFailure {
            step_id: step_id.to_string(),
            message: format!("Checkpoint store error: {}", err),
            attempts: 0,
            replayed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recast_db::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn executor(store: &Arc<MemoryStore>, max_attempts: u32) -> StepExecutor {
        StepExecutor::new(
            Uuid::new_v4(),
            store.clone() as Arc<dyn CheckpointStore>,
            RetryPolicy::new(max_attempts),
        )
    }

    #[test]
    fn retry_backoff_exponential_then_capped() {
        assert_eq!(compute_retry_backoff_seconds(1), 2);
        assert_eq!(compute_retry_backoff_seconds(2), 4);
        assert_eq!(compute_retry_backoff_seconds(8), 256);
        assert_eq!(compute_retry_backoff_seconds(9), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(20), MAX_RETRY_BACKOFF_SECS);
    }

    #[tokio::test]
    async fn second_invocation_replays_without_executing() {
        let store = Arc::new(MemoryStore::new());
        let executor = executor(&store, 3);
        let invocations = AtomicUsize::new(0);

        let body = || async {
            invocations.fetch_add(1, Ordering::SeqCst);
            Ok::<_, StepError>("result".to_string())
        };

        let first: String = executor.run_step("work", body).await.unwrap();
        let second: String = executor.run_step("work", body).await.unwrap();

        assert_eq!(first, "result");
        assert_eq!(second, "result");
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recoverable_errors_retry_until_success() {
        let store = Arc::new(MemoryStore::new());
        let executor = executor(&store, 3);
        let invocations = AtomicUsize::new(0);

        let result: String = executor
            .run_step("flaky", || async {
                let n = invocations.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(StepError::recoverable(anyhow::anyhow!("timeout")))
                } else {
                    Ok("ok".to_string())
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "ok");
        assert_eq!(invocations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_is_bounded() {
        let store = Arc::new(MemoryStore::new());
        let executor = executor(&store, 3);
        let invocations = AtomicUsize::new(0);

        let err = executor
            .run_step("doomed", || async {
                invocations.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(StepError::recoverable(anyhow::anyhow!("always down")))
            })
            .await
            .unwrap_err();

        assert_eq!(invocations.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempts, 3);
        assert!(err.message.contains("always down"));
    }

    #[tokio::test]
    async fn unrecoverable_error_skips_retries() {
        let store = Arc::new(MemoryStore::new());
        let executor = executor(&store, 3);
        let invocations = AtomicUsize::new(0);

        let err = executor
            .run_step("precondition", || async {
                invocations.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(StepError::unrecoverable(anyhow::anyhow!("no chapters")))
            })
            .await
            .unwrap_err();

        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(err.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_checkpointed_and_replayed() {
        let store = Arc::new(MemoryStore::new());
        let executor = executor(&store, 2);
        let invocations = AtomicUsize::new(0);

        let first = executor
            .run_step("broken", || async {
                invocations.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(StepError::recoverable(anyhow::anyhow!("down")))
            })
            .await
            .unwrap_err();
        assert!(!first.replayed);

        // Replay returns the recorded failure without invoking the body.
        let second = executor
            .run_step("broken", || async {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok::<String, StepError>("would succeed now".into())
            })
            .await
            .unwrap_err();

        assert!(second.replayed);
        assert_eq!(second.message, first.message);
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_steps_have_independent_slots() {
        let store = Arc::new(MemoryStore::new());
        let executor = executor(&store, 3);

        let a: u32 = executor.run_step("step-a", || async { Ok(1) }).await.unwrap();
        let b: u32 = executor.run_step("step-b", || async { Ok(2) }).await.unwrap();

        assert_eq!((a, b), (1, 2));
        assert_eq!(store.checkpoint_count(), 2);
    }

    #[tokio::test]
    async fn same_step_id_in_different_runs_is_distinct() {
        let store = Arc::new(MemoryStore::new());
        let first = executor(&store, 3);
        let second = executor(&store, 3);

        let a: u32 = first.run_step("shared", || async { Ok(1) }).await.unwrap();
        let b: u32 = second.run_step("shared", || async { Ok(2) }).await.unwrap();

        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }
}
