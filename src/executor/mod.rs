//! The task executor: runs one agent task to a terminal state.
//!
//! The executor fully contains backend failures. Transient failures
//! (`Unreachable`, `Timeout`) are retried with exponential backoff and
//! jitter; `InvalidResponse` is permanent and fails the task on the spot.
//! A cancellation token is checked at every attempt boundary and raced
//! against backoff sleeps, so a cancelled task stops mid-backoff without
//! another attempt.

mod retry;

pub use retry::RetryPolicy;

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::{AgentBackend, BackendFailure, InvocationRequest};
use crate::cancellation::CancelToken;
use crate::core::{ProjectId, TaskId, TaskOutcome, TaskResult};
use crate::stages::AgentKind;

/// Observer for non-terminal task transitions.
///
/// The state machine implements this to mirror executor progress into task
/// records and the event stream.
pub trait TaskProgress: Send + Sync {
    /// An invocation attempt is starting.
    fn task_running(&self, task: TaskId, attempt: u32);
    /// The task is backing off before another attempt.
    fn task_retrying(&self, task: TaskId, attempt: u32, delay: Duration);
}

/// A no-op progress observer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl TaskProgress for NoopProgress {
    fn task_running(&self, _task: TaskId, _attempt: u32) {}
    fn task_retrying(&self, _task: TaskId, _attempt: u32, _delay: Duration) {}
}

/// The work description handed to the pool for one agent task.
#[derive(Debug, Clone)]
pub struct TaskJob {
    /// The task being executed.
    pub task_id: TaskId,
    /// The owning project.
    pub project_id: ProjectId,
    /// The owning stage (1-based).
    pub stage: u32,
    /// The agent to invoke.
    pub agent: AgentKind,
    /// The prompt (the project's idea text).
    pub prompt: String,
}

/// Executes single agent tasks against a backend with retry, timeout, and
/// cancellation.
pub struct TaskExecutor {
    backend: Arc<dyn AgentBackend>,
    policy: RetryPolicy,
    per_task_timeout: Duration,
}

impl TaskExecutor {
    /// Creates an executor over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn AgentBackend>, policy: RetryPolicy, per_task_timeout: Duration) -> Self {
        Self {
            backend,
            policy,
            per_task_timeout,
        }
    }

    /// Runs one task to a terminal outcome.
    ///
    /// Never returns an error: every failure mode is folded into the
    /// returned [`TaskOutcome`].
    pub async fn run(
        &self,
        job: &TaskJob,
        progress: &dyn TaskProgress,
        cancel: &CancelToken,
    ) -> TaskOutcome {
        let request = InvocationRequest::new(job.agent, job.prompt.clone());
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return TaskOutcome::Cancelled;
            }

            attempt += 1;
            progress.task_running(job.task_id, attempt);
            debug!(task = %job.task_id, agent = %job.agent, attempt, "Attempting invocation");

            let failure = match tokio::time::timeout(
                self.per_task_timeout,
                self.backend.invoke(&request),
            )
            .await
            {
                Ok(Ok(reply)) => {
                    return TaskOutcome::Succeeded(TaskResult {
                        text: reply.text,
                        tokens_estimate: reply.tokens_estimate,
                        cost_estimate: reply.cost_estimate,
                    });
                }
                Ok(Err(failure)) => failure,
                Err(_) => BackendFailure::Timeout(self.per_task_timeout),
            };

            // A result arriving after cancellation is discarded.
            if cancel.is_cancelled() {
                return TaskOutcome::Cancelled;
            }

            if !failure.is_transient() {
                warn!(task = %job.task_id, agent = %job.agent, %failure, "Permanent backend failure");
                return TaskOutcome::Failed {
                    kind: failure.kind(),
                    message: failure.to_string(),
                };
            }

            if attempt >= self.policy.max_retries {
                warn!(
                    task = %job.task_id,
                    agent = %job.agent,
                    attempts = attempt,
                    %failure,
                    "Retries exhausted"
                );
                return TaskOutcome::Failed {
                    kind: failure.kind(),
                    message: failure.to_string(),
                };
            }

            let delay = self.policy.jittered_delay(attempt);
            progress.task_retrying(job.task_id, attempt, delay);
            debug!(
                task = %job.task_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                %failure,
                "Retrying after transient failure"
            );

            tokio::select! {
                () = cancel.cancelled() => return TaskOutcome::Cancelled,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FailureKind;
    use crate::testing::ScriptedBackend;
    use parking_lot::Mutex;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(max_retries)
            .with_base_delay(Duration::from_millis(5))
            .with_max_delay(Duration::from_millis(20))
    }

    fn job() -> TaskJob {
        TaskJob {
            task_id: TaskId::new(),
            project_id: ProjectId::new(),
            stage: 1,
            agent: AgentKind::IdeaProcessor,
            prompt: "an idea".to_string(),
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        transitions: Mutex<Vec<String>>,
    }

    impl TaskProgress for RecordingProgress {
        fn task_running(&self, _task: TaskId, attempt: u32) {
            self.transitions.lock().push(format!("running:{attempt}"));
        }
        fn task_retrying(&self, _task: TaskId, attempt: u32, _delay: Duration) {
            self.transitions.lock().push(format!("retrying:{attempt}"));
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let backend = Arc::new(ScriptedBackend::always_succeeding("done"));
        let executor = TaskExecutor::new(backend.clone(), fast_policy(3), Duration::from_secs(5));

        let outcome = executor
            .run(&job(), &NoopProgress, &CancelToken::new())
            .await;

        assert!(outcome.is_success());
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_always_timeout_fails_after_exactly_max_retries_attempts() {
        let backend = Arc::new(ScriptedBackend::always_failing(
            BackendFailure::Timeout(Duration::from_secs(1)),
        ));
        let executor = TaskExecutor::new(backend.clone(), fast_policy(3), Duration::from_secs(5));

        let outcome = executor
            .run(&job(), &NoopProgress, &CancelToken::new())
            .await;

        assert!(matches!(
            outcome,
            TaskOutcome::Failed {
                kind: FailureKind::Timeout,
                ..
            }
        ));
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_invalid_response_is_not_retried() {
        let backend = Arc::new(ScriptedBackend::always_failing(
            BackendFailure::InvalidResponse("garbage".to_string()),
        ));
        let executor = TaskExecutor::new(backend.clone(), fast_policy(3), Duration::from_secs(5));

        let outcome = executor
            .run(&job(), &NoopProgress, &CancelToken::new())
            .await;

        assert!(matches!(
            outcome,
            TaskOutcome::Failed {
                kind: FailureKind::InvalidResponse,
                ..
            }
        ));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let backend = Arc::new(ScriptedBackend::always_succeeding("recovered"));
        backend.script(
            AgentKind::IdeaProcessor,
            Err(BackendFailure::Unreachable("refused".to_string())),
        );
        let executor = TaskExecutor::new(backend.clone(), fast_policy(3), Duration::from_secs(5));

        let progress = RecordingProgress::default();
        let outcome = executor.run(&job(), &progress, &CancelToken::new()).await;

        assert!(outcome.is_success());
        assert_eq!(backend.call_count(), 2);
        assert_eq!(
            *progress.transitions.lock(),
            vec!["running:1", "retrying:1", "running:2"]
        );
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_yields_cancelled_without_more_attempts() {
        let backend = Arc::new(ScriptedBackend::always_failing(
            BackendFailure::Unreachable("down".to_string()),
        ));
        // Long backoff so cancellation lands mid-sleep.
        let policy = RetryPolicy::new()
            .with_max_retries(5)
            .with_base_delay(Duration::from_secs(30))
            .with_max_delay(Duration::from_secs(30));
        let executor = TaskExecutor::new(backend.clone(), policy, Duration::from_secs(5));

        let cancel = Arc::new(CancelToken::new());
        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel("operator");
            })
        };

        let outcome = executor.run(&job(), &NoopProgress, &cancel).await;
        canceller.await.unwrap();

        assert_eq!(outcome, TaskOutcome::Cancelled);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_pre_cancelled_task_makes_no_attempts() {
        let backend = Arc::new(ScriptedBackend::always_succeeding("unused"));
        let executor = TaskExecutor::new(backend.clone(), fast_policy(3), Duration::from_secs(5));

        let cancel = CancelToken::new();
        cancel.cancel("before dispatch");

        let outcome = executor.run(&job(), &NoopProgress, &cancel).await;
        assert_eq!(outcome, TaskOutcome::Cancelled);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_backend_hits_per_task_timeout() {
        let backend = Arc::new(ScriptedBackend::always_succeeding("slow"));
        backend.set_delay(Duration::from_millis(200));
        let executor = TaskExecutor::new(
            backend.clone(),
            fast_policy(2),
            Duration::from_millis(20),
        );

        let outcome = executor
            .run(&job(), &NoopProgress, &CancelToken::new())
            .await;

        assert!(matches!(
            outcome,
            TaskOutcome::Failed {
                kind: FailureKind::Timeout,
                ..
            }
        ));
    }
}
