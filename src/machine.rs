//! The pipeline state machine: per-project authority over stage and task
//! lifecycle.
//!
//! All mutations to one project's state happen under that project's
//! exclusive section, so invariants hold atomically while unrelated
//! projects proceed in parallel. Events are produced inside the section,
//! which makes each project's event order match its state order.

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cancellation::CancelToken;
use crate::core::{
    AgentTask, Project, ProjectId, ProjectStatus, ProjectView, StageRun, StageRunStatus, TaskId,
    TaskOutcome, TaskStatus, TaskView,
};
use crate::errors::OrchestrationError;
use crate::events::{Event, EventBus, EventKind, EventStream};
use crate::executor::{TaskJob, TaskProgress};
use crate::stages::StageGraph;

/// The work produced by an accepted stage advancement: one job per
/// required agent, plus the project's cancellation token.
#[derive(Debug)]
pub struct StageDispatch {
    /// The stage that was dispatched (1-based).
    pub stage: u32,
    /// One job per required agent, in roster order.
    pub jobs: Vec<TaskJob>,
    /// The owning project's cancellation token.
    pub cancel: Arc<CancelToken>,
}

struct ProjectState {
    project: Project,
    stage_runs: Vec<StageRun>,
    tasks: HashMap<TaskId, AgentTask>,
    next_seq: u64,
    cancel: Arc<CancelToken>,
}

/// Per-project authority over stage and task lifecycle.
pub struct PipelineMachine {
    projects: DashMap<ProjectId, Arc<Mutex<ProjectState>>>,
    task_index: DashMap<TaskId, ProjectId>,
    bus: Arc<EventBus>,
}

impl PipelineMachine {
    /// Creates a machine publishing into the given bus.
    #[must_use]
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            projects: DashMap::new(),
            task_index: DashMap::new(),
            bus,
        }
    }

    /// Registers a new draft project.
    pub fn create_project(&self, idea: impl Into<String>) -> ProjectId {
        let project = Project::new(idea);
        let id = project.id;
        self.projects.insert(
            id,
            Arc::new(Mutex::new(ProjectState {
                project,
                stage_runs: Vec::new(),
                tasks: HashMap::new(),
                next_seq: 0,
                cancel: Arc::new(CancelToken::new()),
            })),
        );
        info!(project = %id, "Project created");
        id
    }

    fn state_of(&self, id: ProjectId) -> Result<Arc<Mutex<ProjectState>>, OrchestrationError> {
        self.projects
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(OrchestrationError::UnknownProject(id))
    }

    /// Produces and publishes one event under the project's exclusive section.
    fn emit(&self, state: &mut ProjectState, kind: EventKind) {
        let seq = state.next_seq;
        state.next_seq += 1;
        self.bus.publish(&Event {
            project: state.project.id,
            seq,
            timestamp: Utc::now(),
            kind,
        });
    }

    fn recompute_cost(state: &mut ProjectState) {
        state.project.total_cost = state
            .tasks
            .values()
            .filter(|task| task.is_terminal())
            .map(|task| task.cost_estimate)
            .sum();
    }

    /// Accepts a stage advancement and returns the tasks to dispatch.
    ///
    /// Rejects projects whose current stage run is still active
    /// (`NotReady`) and projects that already finished (`TerminalProject`).
    /// The returned jobs are created `Pending`; the caller is responsible
    /// for feeding them to the worker pool and routing outcomes back via
    /// [`record_task_outcome`](Self::record_task_outcome).
    pub fn advance_stage(&self, id: ProjectId) -> Result<StageDispatch, OrchestrationError> {
        let state_arc = self.state_of(id)?;
        let mut state = state_arc.lock();
        let state = &mut *state;

        let status = state.project.status;
        if status.is_terminal() {
            return Err(OrchestrationError::TerminalProject {
                project: id,
                status,
            });
        }
        if status == ProjectStatus::InProgress {
            return Err(OrchestrationError::NotReady {
                project: id,
                stage: state.project.stage_index,
            });
        }

        let next = state.project.stage_index + 1;
        let agents = StageGraph::required_agents(next)?;
        let policy = StageGraph::completion_policy(next)?;

        let mut jobs = Vec::with_capacity(agents.len());
        let mut task_ids = Vec::with_capacity(agents.len());
        for agent in agents {
            let task = AgentTask::new(id, next, *agent);
            self.task_index.insert(task.id, id);
            task_ids.push(task.id);
            jobs.push(TaskJob {
                task_id: task.id,
                project_id: id,
                stage: next,
                agent: *agent,
                prompt: state.project.idea.clone(),
            });
            state.tasks.insert(task.id, task);
        }

        state.stage_runs.push(StageRun::new(next, policy, task_ids));
        state.project.stage_index = next;
        state.project.status = ProjectStatus::InProgress;

        info!(
            project = %id,
            stage = next,
            stage_name = StageGraph::stage_name(next)?,
            tasks = jobs.len(),
            "Stage dispatched"
        );

        Ok(StageDispatch {
            stage: next,
            jobs,
            cancel: Arc::clone(&state.cancel),
        })
    }

    /// Applies a task's terminal outcome and recomputes derived state.
    ///
    /// Idempotent: a second outcome for an already-terminal task is
    /// discarded, which also covers results returning after cancellation.
    pub fn record_task_outcome(&self, task_id: TaskId, outcome: TaskOutcome) {
        let Some(project_id) = self.task_index.get(&task_id).map(|entry| *entry.value()) else {
            warn!(task = %task_id, "Outcome for unknown task discarded");
            return;
        };
        let Ok(state_arc) = self.state_of(project_id) else {
            return;
        };
        let mut state = state_arc.lock();
        let state = &mut *state;

        let Some(task) = state.tasks.get_mut(&task_id) else {
            return;
        };
        if task.is_terminal() {
            debug!(task = %task_id, "Late outcome for terminal task discarded");
            return;
        }
        task.apply_outcome(&outcome);
        let agent = task.agent;
        let stage = task.stage;

        match &outcome {
            TaskOutcome::Succeeded(result) => self.emit(
                state,
                EventKind::TaskSucceeded {
                    task: task_id,
                    agent,
                    cost_estimate: result.cost_estimate,
                },
            ),
            TaskOutcome::Failed { kind, .. } => self.emit(
                state,
                EventKind::TaskFailed {
                    task: task_id,
                    agent,
                    failure: *kind,
                },
            ),
            TaskOutcome::Cancelled => {}
        }

        Self::recompute_cost(state);

        if let Some(run_idx) = state.stage_runs.iter().position(|run| run.stage == stage) {
            let previous = state.stage_runs[run_idx].status;
            let derived = state.stage_runs[run_idx].derive_status(&state.tasks);
            // A sibling outcome arriving after the run settled updates only
            // the task record above; the run's terminal status is written
            // exactly once, and already-dispatched siblings keep running to
            // their own terminal outcome.
            if previous == StageRunStatus::Active && derived.is_terminal() {
                state.stage_runs[run_idx].status = derived;
                match derived {
                    StageRunStatus::Succeeded => {
                        self.emit(state, EventKind::StageCompleted { stage });
                        let is_last = matches!(StageGraph::next_stage(stage), Ok(None));
                        if is_last {
                            state.project.status = ProjectStatus::Completed;
                            self.emit(state, EventKind::ProjectCompleted);
                            info!(project = %project_id, "Project completed");
                        } else {
                            state.project.status = ProjectStatus::StageComplete;
                            info!(project = %project_id, stage, "Stage completed");
                        }
                    }
                    StageRunStatus::Failed => {
                        state.project.status = ProjectStatus::Failed;
                        self.emit(state, EventKind::StageFailed { stage });
                        self.emit(state, EventKind::ProjectFailed);
                        warn!(project = %project_id, stage, "Stage failed, project failed");
                    }
                    StageRunStatus::Active => {}
                }
            }
        }

        self.teardown_if_settled(state);
    }

    /// Cancels a project and all of its non-terminal tasks.
    ///
    /// Cooperative: running invocations finish their network call but
    /// their results are discarded. Idempotent on terminal projects.
    pub fn cancel_project(&self, id: ProjectId) -> Result<(), OrchestrationError> {
        let state_arc = self.state_of(id)?;
        let mut state = state_arc.lock();
        let state = &mut *state;

        // Stop in-flight work even when the project already settled; a
        // repeat cancel is accepted without further status changes.
        state.cancel.cancel("project cancelled by operator");
        let now = Utc::now();
        for task in state.tasks.values_mut() {
            if !task.is_terminal() {
                task.status = TaskStatus::Cancelled;
                task.finished_at = Some(now);
            }
        }

        if !state.project.status.is_terminal() {
            let mut failed_stage = None;
            if let Some(run) = state.stage_runs.last_mut() {
                if run.status == StageRunStatus::Active {
                    run.status = StageRunStatus::Failed;
                    failed_stage = Some(run.stage);
                }
            }

            state.project.status = ProjectStatus::Failed;
            Self::recompute_cost(state);

            if let Some(stage) = failed_stage {
                self.emit(state, EventKind::StageFailed { stage });
            }
            self.emit(state, EventKind::ProjectFailed);
            info!(project = %id, "Project cancelled");
        }

        self.teardown_if_settled(state);
        Ok(())
    }

    /// Drops the project's subscriber lists once nothing can produce
    /// further events: the project is terminal and every task settled.
    /// Streams drain their buffered events and then end.
    fn teardown_if_settled(&self, state: &ProjectState) {
        if state.project.status.is_terminal()
            && state.tasks.values().all(AgentTask::is_terminal)
        {
            self.bus.remove_project(state.project.id);
        }
    }

    /// Returns a point-in-time view of the project.
    ///
    /// Never blocks on in-flight work beyond the project's short exclusive
    /// section.
    pub fn snapshot(&self, id: ProjectId) -> Result<ProjectView, OrchestrationError> {
        let state_arc = self.state_of(id)?;
        let state = state_arc.lock();

        let mut tasks = Vec::new();
        for run in &state.stage_runs {
            for task_id in &run.task_ids {
                if let Some(task) = state.tasks.get(task_id) {
                    tasks.push(TaskView::from_task(task));
                }
            }
        }

        Ok(ProjectView {
            id,
            stage_index: state.project.stage_index,
            status: state.project.status,
            total_cost: state.project.total_cost,
            tasks,
        })
    }

    /// Subscribes to the project's ordered event stream.
    pub fn subscribe(&self, id: ProjectId) -> Result<EventStream, OrchestrationError> {
        if !self.projects.contains_key(&id) {
            return Err(OrchestrationError::UnknownProject(id));
        }
        Ok(self.bus.subscribe(id))
    }
}

impl TaskProgress for PipelineMachine {
    fn task_running(&self, task_id: TaskId, attempt: u32) {
        let Some(project_id) = self.task_index.get(&task_id).map(|entry| *entry.value()) else {
            return;
        };
        let Ok(state_arc) = self.state_of(project_id) else {
            return;
        };
        let mut state = state_arc.lock();
        let state = &mut *state;
        let Some(task) = state.tasks.get_mut(&task_id) else {
            return;
        };
        if task.is_terminal() {
            return;
        }
        task.status = TaskStatus::Running;
        task.attempts = attempt;
        if task.started_at.is_none() {
            task.started_at = Some(Utc::now());
        }
        let agent = task.agent;
        if attempt == 1 {
            self.emit(state, EventKind::TaskStarted { task: task_id, agent });
        }
    }

    fn task_retrying(&self, task_id: TaskId, attempt: u32, delay: Duration) {
        let Some(project_id) = self.task_index.get(&task_id).map(|entry| *entry.value()) else {
            return;
        };
        let Ok(state_arc) = self.state_of(project_id) else {
            return;
        };
        let mut state = state_arc.lock();
        let state = &mut *state;
        let Some(task) = state.tasks.get_mut(&task_id) else {
            return;
        };
        if task.is_terminal() {
            return;
        }
        task.status = TaskStatus::Retrying;
        let agent = task.agent;
        self.emit(
            state,
            EventKind::TaskRetrying {
                task: task_id,
                agent,
                attempt,
                delay_ms: delay.as_millis() as u64,
            },
        );
    }
}
