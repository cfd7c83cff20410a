//! Project and stage-run records plus read-only snapshot views.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ids::{ProjectId, TaskId};
use super::status::{CompletionPolicy, ProjectStatus, StageRunStatus, TaskStatus};
use super::task::{AgentTask, FailureKind};
use crate::stages::AgentKind;

/// A project travelling through the six-stage pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique project id.
    pub id: ProjectId,
    /// The idea text submitted by the operator; used as the agent prompt.
    pub idea: String,
    /// Pipeline position: 0 before any stage, then the 1-based index of the
    /// stage currently running or last finished.
    pub stage_index: u32,
    /// Overall lifecycle status.
    pub status: ProjectStatus,
    /// Sum of cost estimates over all terminal tasks.
    pub total_cost: f64,
}

impl Project {
    /// Creates a new draft project from an idea.
    #[must_use]
    pub fn new(idea: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            idea: idea.into(),
            stage_index: 0,
            status: ProjectStatus::Draft,
            total_cost: 0.0,
        }
    }
}

/// Aggregate execution record for the tasks of one (project, stage) pair.
///
/// The status field is a cached projection; [`StageRun::derive_status`] is
/// the authoritative computation and is re-applied on every child
/// transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRun {
    /// The 1-based stage index.
    pub stage: u32,
    /// The completion policy in force for this stage.
    pub policy: CompletionPolicy,
    /// Child tasks, in dispatch order.
    pub task_ids: Vec<TaskId>,
    /// Cached derived status.
    pub status: StageRunStatus,
}

impl StageRun {
    /// Creates an active stage run over the given tasks.
    #[must_use]
    pub fn new(stage: u32, policy: CompletionPolicy, task_ids: Vec<TaskId>) -> Self {
        Self {
            stage,
            policy,
            task_ids,
            status: StageRunStatus::Active,
        }
    }

    /// Computes the derived status from the current child task statuses.
    ///
    /// `AllMustSucceed`: the first terminally failed or cancelled child
    /// fails the run immediately, without waiting for siblings; the run
    /// succeeds only when every child succeeded. `BestEffort`: the run
    /// succeeds once every child is terminal, regardless of outcome mix.
    #[must_use]
    pub fn derive_status(&self, tasks: &HashMap<TaskId, AgentTask>) -> StageRunStatus {
        let statuses: Vec<TaskStatus> = self
            .task_ids
            .iter()
            .filter_map(|id| tasks.get(id).map(|t| t.status))
            .collect();

        match self.policy {
            CompletionPolicy::AllMustSucceed => {
                if statuses
                    .iter()
                    .any(|s| matches!(s, TaskStatus::Failed | TaskStatus::Cancelled))
                {
                    StageRunStatus::Failed
                } else if statuses.iter().all(|s| *s == TaskStatus::Succeeded) {
                    StageRunStatus::Succeeded
                } else {
                    StageRunStatus::Active
                }
            }
            CompletionPolicy::BestEffort => {
                if statuses.iter().all(TaskStatus::is_terminal) {
                    StageRunStatus::Succeeded
                } else {
                    StageRunStatus::Active
                }
            }
        }
    }
}

/// Point-in-time view of one task, exposed through snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    /// Task id.
    pub id: TaskId,
    /// Owning stage (1-based).
    pub stage: u32,
    /// Agent kind.
    pub agent: AgentKind,
    /// Current status.
    pub status: TaskStatus,
    /// Attempts made so far.
    pub attempts: u32,
    /// Cost estimate, populated once terminal.
    pub cost_estimate: f64,
    /// Result text, populated on success.
    pub result: Option<String>,
    /// Failure kind, populated on permanent failure.
    pub failure: Option<FailureKind>,
}

impl TaskView {
    /// Builds a view from a task record.
    #[must_use]
    pub fn from_task(task: &AgentTask) -> Self {
        Self {
            id: task.id,
            stage: task.stage,
            agent: task.agent,
            status: task.status,
            attempts: task.attempts,
            cost_estimate: task.cost_estimate,
            result: task.result.clone(),
            failure: task.failure,
        }
    }
}

/// Point-in-time view of a project for the external collaborator.
///
/// Snapshots never block on in-flight work and two snapshots taken with no
/// intervening mutation compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectView {
    /// Project id.
    pub id: ProjectId,
    /// Pipeline position (0 before any stage, else 1-based stage index).
    pub stage_index: u32,
    /// Overall status.
    pub status: ProjectStatus,
    /// Accumulated cost over terminal tasks.
    pub total_cost: f64,
    /// Tasks across all stage runs, in dispatch order.
    pub tasks: Vec<TaskView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::{TaskOutcome, TaskResult};

    fn run_with_outcomes(policy: CompletionPolicy, outcomes: &[Option<TaskOutcome>]) -> (StageRun, HashMap<TaskId, AgentTask>) {
        let project = ProjectId::new();
        let mut tasks = HashMap::new();
        let mut ids = Vec::new();
        for outcome in outcomes {
            let mut task = AgentTask::new(project, 1, AgentKind::IdeaProcessor);
            if let Some(outcome) = outcome {
                task.apply_outcome(outcome);
            }
            ids.push(task.id);
            tasks.insert(task.id, task);
        }
        (StageRun::new(1, policy, ids), tasks)
    }

    fn success() -> Option<TaskOutcome> {
        Some(TaskOutcome::Succeeded(TaskResult {
            text: "ok".to_string(),
            tokens_estimate: 1,
            cost_estimate: 0.0,
        }))
    }

    fn failure() -> Option<TaskOutcome> {
        Some(TaskOutcome::Failed {
            kind: FailureKind::Timeout,
            message: "deadline".to_string(),
        })
    }

    #[test]
    fn test_all_must_succeed_requires_every_child() {
        let (run, tasks) = run_with_outcomes(
            CompletionPolicy::AllMustSucceed,
            &[success(), None],
        );
        assert_eq!(run.derive_status(&tasks), StageRunStatus::Active);

        let (run, tasks) = run_with_outcomes(
            CompletionPolicy::AllMustSucceed,
            &[success(), success()],
        );
        assert_eq!(run.derive_status(&tasks), StageRunStatus::Succeeded);
    }

    #[test]
    fn test_all_must_succeed_fails_without_waiting_for_siblings() {
        // One child failed permanently while the other is still pending.
        let (run, tasks) = run_with_outcomes(
            CompletionPolicy::AllMustSucceed,
            &[failure(), None],
        );
        assert_eq!(run.derive_status(&tasks), StageRunStatus::Failed);
    }

    #[test]
    fn test_all_must_succeed_cancelled_child_fails_run() {
        let (run, tasks) = run_with_outcomes(
            CompletionPolicy::AllMustSucceed,
            &[Some(TaskOutcome::Cancelled), success()],
        );
        assert_eq!(run.derive_status(&tasks), StageRunStatus::Failed);
    }

    #[test]
    fn test_best_effort_succeeds_on_any_terminal_mix() {
        let (run, tasks) = run_with_outcomes(
            CompletionPolicy::BestEffort,
            &[success(), failure(), Some(TaskOutcome::Cancelled)],
        );
        assert_eq!(run.derive_status(&tasks), StageRunStatus::Succeeded);
    }

    #[test]
    fn test_best_effort_waits_for_all_children() {
        let (run, tasks) = run_with_outcomes(
            CompletionPolicy::BestEffort,
            &[success(), failure(), None],
        );
        assert_eq!(run.derive_status(&tasks), StageRunStatus::Active);
    }

    #[test]
    fn test_new_project_is_draft() {
        let project = Project::new("a marketplace for vintage synths");
        assert_eq!(project.status, ProjectStatus::Draft);
        assert_eq!(project.stage_index, 0);
        assert!((project.total_cost - 0.0).abs() < f64::EPSILON);
    }
}
