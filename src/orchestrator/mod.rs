//! The orchestrator facade: the single entry point collaborators use.
//!
//! Wires the event bus, state machine, executor, and worker pool together
//! and exposes the project lifecycle API. `advance_stage` returns as soon
//! as the stage's tasks are accepted; per-task driver tasks feed the pool
//! and route outcomes back into the machine, so a full ready queue slows
//! dispatch without blocking the caller.


use std::sync::Arc;
use tracing::warn;

use crate::backend::AgentBackend;
use crate::config::OrchestratorConfig;
use crate::core::{ProjectId, ProjectView, TaskOutcome};
use crate::errors::OrchestrationError;
use crate::events::{BusMetrics, EventBus, EventStream};
use crate::executor::{TaskExecutor, TaskProgress};
use crate::machine::PipelineMachine;
use crate::pool::WorkerPool;

/// The project pipeline orchestrator.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct Orchestrator {
    machine: Arc<PipelineMachine>,
    pool: Arc<WorkerPool>,
    bus: Arc<EventBus>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Builds an orchestrator over the given backend.
    ///
    /// Must be called from within a tokio runtime: the worker pool spawns
    /// its execution slots immediately.
    #[must_use]
    pub fn new(config: OrchestratorConfig, backend: Arc<dyn AgentBackend>) -> Self {
        let bus = Arc::new(EventBus::new(config.subscriber_buffer));
        let machine = Arc::new(PipelineMachine::new(Arc::clone(&bus)));
        let executor = Arc::new(TaskExecutor::new(
            backend,
            config.retry_policy(),
            config.per_task_timeout,
        ));
        let progress: Arc<dyn TaskProgress> = Arc::clone(&machine) as Arc<dyn TaskProgress>;
        let pool = Arc::new(WorkerPool::new(
            config.worker_pool_size,
            config.queue_capacity,
            executor,
            progress,
        ));

        Self {
            machine,
            pool,
            bus,
            config,
        }
    }

    /// Registers a new draft project around an idea.
    pub fn create_project(&self, idea: impl Into<String>) -> ProjectId {
        self.machine.create_project(idea)
    }

    /// Starts the project's next stage.
    ///
    /// Returns the dispatched stage number once its tasks are accepted.
    /// Rejects projects whose current stage is still running (`NotReady`)
    /// and projects that already finished (`TerminalProject`). Task
    /// execution proceeds in the background; observe it via
    /// [`subscribe`](Self::subscribe) or [`snapshot`](Self::snapshot).
    pub fn advance_stage(&self, id: ProjectId) -> Result<u32, OrchestrationError> {
        let dispatch = self.machine.advance_stage(id)?;
        let stage = dispatch.stage;

        for job in dispatch.jobs {
            let machine = Arc::clone(&self.machine);
            let pool = Arc::clone(&self.pool);
            let cancel = Arc::clone(&dispatch.cancel);
            tokio::spawn(async move {
                let task_id = job.task_id;
                match pool.submit(job, cancel).await {
                    Ok(handle) => {
                        let outcome = handle.wait().await;
                        machine.record_task_outcome(task_id, outcome);
                    }
                    Err(error) => {
                        warn!(task = %task_id, %error, "Submission rejected");
                        machine.record_task_outcome(task_id, TaskOutcome::Cancelled);
                    }
                }
            });
        }

        Ok(stage)
    }

    /// Returns a point-in-time view of a project.
    pub fn snapshot(&self, id: ProjectId) -> Result<ProjectView, OrchestrationError> {
        self.machine.snapshot(id)
    }

    /// Subscribes to a project's ordered event stream.
    pub fn subscribe(&self, id: ProjectId) -> Result<EventStream, OrchestrationError> {
        self.machine.subscribe(id)
    }

    /// Cancels a project and its in-flight tasks. Idempotent.
    pub fn cancel_project(&self, id: ProjectId) -> Result<(), OrchestrationError> {
        self.machine.cancel_project(id)
    }

    /// The configuration this orchestrator was built with.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Event delivery counters.
    #[must_use]
    pub fn bus_metrics(&self) -> &BusMetrics {
        self.bus.metrics()
    }

    /// Stops accepting work and drains the worker pool.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
