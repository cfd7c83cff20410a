//! Bounded worker pool for concurrent task execution.
//!
//! A fixed number of execution slots pull jobs from a bounded FIFO queue.
//! The queue is FIFO across projects; no per-project fairness beyond that
//! is provided. `submit` blocks when the queue is full, bounding memory
//! under stages that fan out many agents at once.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cancellation::CancelToken;
use crate::core::TaskOutcome;
use crate::errors::OrchestrationError;
use crate::executor::{TaskExecutor, TaskJob, TaskProgress};

struct PoolJob {
    job: TaskJob,
    cancel: Arc<CancelToken>,
    done: oneshot::Sender<TaskOutcome>,
}

/// Resolves when the submitted task reaches a terminal state.
#[derive(Debug)]
pub struct CompletionHandle {
    rx: oneshot::Receiver<TaskOutcome>,
}

impl CompletionHandle {
    /// Waits for the task's terminal outcome.
    ///
    /// If the pool shuts down before the task runs, the outcome is
    /// `Cancelled`.
    pub async fn wait(self) -> TaskOutcome {
        self.rx.await.unwrap_or(TaskOutcome::Cancelled)
    }
}

/// A fixed set of concurrent execution slots fed by a bounded ready queue.
pub struct WorkerPool {
    tx: parking_lot::Mutex<Option<mpsc::Sender<PoolJob>>>,
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawns `size` workers over a queue of `queue_capacity` slots.
    #[must_use]
    pub fn new(
        size: usize,
        queue_capacity: usize,
        executor: Arc<TaskExecutor>,
        progress: Arc<dyn TaskProgress>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<PoolJob>(queue_capacity.max(1));
        let rx = Arc::new(AsyncMutex::new(rx));

        let mut workers = Vec::with_capacity(size.max(1));
        for slot in 0..size.max(1) {
            let rx = Arc::clone(&rx);
            let executor = Arc::clone(&executor);
            let progress = Arc::clone(&progress);
            workers.push(tokio::spawn(async move {
                loop {
                    // Hold the receiver lock only while pulling one job.
                    let next = { rx.lock().await.recv().await };
                    let Some(pool_job) = next else {
                        debug!(slot, "Worker slot draining, queue closed");
                        break;
                    };
                    let outcome = executor
                        .run(&pool_job.job, progress.as_ref(), &pool_job.cancel)
                        .await;
                    // The driver may have gone away; that is not an error.
                    let _ = pool_job.done.send(outcome);
                }
            }));
        }

        info!(size = size.max(1), queue_capacity = queue_capacity.max(1), "Worker pool started");

        Self {
            tx: parking_lot::Mutex::new(Some(tx)),
            workers: parking_lot::Mutex::new(workers),
        }
    }

    /// Submits a task for execution.
    ///
    /// Blocks while the ready queue is full. Returns a handle that resolves
    /// with the task's terminal outcome.
    pub async fn submit(
        &self,
        job: TaskJob,
        cancel: Arc<CancelToken>,
    ) -> Result<CompletionHandle, OrchestrationError> {
        let tx = self
            .tx
            .lock()
            .clone()
            .ok_or(OrchestrationError::Shutdown)?;

        let (done, rx) = oneshot::channel();
        tx.send(PoolJob { job, cancel, done })
            .await
            .map_err(|_| OrchestrationError::Shutdown)?;

        Ok(CompletionHandle { rx })
    }

    /// Closes the queue and waits for workers to drain outstanding jobs.
    pub async fn shutdown(&self) {
        // Dropping the sender closes the channel once queued jobs drain.
        drop(self.tx.lock().take());

        let workers: Vec<_> = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let _ = worker.await;
        }
        info!("Worker pool stopped");
    }
}
