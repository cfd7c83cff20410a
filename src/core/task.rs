//! Agent task records and terminal outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{ProjectId, TaskId};
use super::status::TaskStatus;
use crate::stages::AgentKind;

/// Classification of a backend failure, recorded on failed tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The backend could not be reached.
    Unreachable,
    /// The call exceeded its configured deadline.
    Timeout,
    /// The backend returned malformed or empty output.
    InvalidResponse,
}

impl FailureKind {
    /// Returns true if a retry may succeed.
    ///
    /// Malformed output from a model is not transient, so only
    /// `Unreachable` and `Timeout` are retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable | Self::Timeout)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => write!(f, "unreachable"),
            Self::Timeout => write!(f, "timeout"),
            Self::InvalidResponse => write!(f, "invalid_response"),
        }
    }
}

/// A successful agent result with its usage estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// The text produced by the agent.
    pub text: String,
    /// Estimated token usage for the call.
    pub tokens_estimate: u64,
    /// Estimated cost for the call, in dollars.
    pub cost_estimate: f64,
}

/// The terminal outcome of executing one agent task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The task produced a usable result.
    Succeeded(TaskResult),
    /// The task failed permanently.
    Failed {
        /// The last failure kind observed.
        kind: FailureKind,
        /// Human-readable description of the failure.
        message: String,
    },
    /// The task was cancelled before reaching a result.
    Cancelled,
}

impl TaskOutcome {
    /// Returns the task status this outcome maps to.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Succeeded(_) => TaskStatus::Succeeded,
            Self::Failed { .. } => TaskStatus::Failed,
            Self::Cancelled => TaskStatus::Cancelled,
        }
    }

    /// Returns true for a successful outcome.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// One agent invocation belonging to exactly one (project, stage) pair.
///
/// A task is never reassigned; its identity and ownership are fixed at
/// creation and only its execution state evolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    /// Unique task id.
    pub id: TaskId,
    /// The owning project.
    pub project: ProjectId,
    /// The owning stage (1-based).
    pub stage: u32,
    /// The category of agent this task invokes.
    pub agent: AgentKind,
    /// Current execution status.
    pub status: TaskStatus,
    /// Number of invocation attempts made so far.
    pub attempts: u32,
    /// When the first attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Estimated token usage, populated on success.
    pub tokens_estimate: u64,
    /// Estimated cost, populated on success.
    pub cost_estimate: f64,
    /// Result text, owned exclusively by the task once terminal.
    pub result: Option<String>,
    /// The last failure kind, populated on permanent failure.
    pub failure: Option<FailureKind>,
    /// Description of the last failure.
    pub failure_message: Option<String>,
}

impl AgentTask {
    /// Creates a new pending task for the given project and stage.
    #[must_use]
    pub fn new(project: ProjectId, stage: u32, agent: AgentKind) -> Self {
        Self {
            id: TaskId::new(),
            project,
            stage,
            agent,
            status: TaskStatus::Pending,
            attempts: 0,
            started_at: None,
            finished_at: None,
            tokens_estimate: 0,
            cost_estimate: 0.0,
            result: None,
            failure: None,
            failure_message: None,
        }
    }

    /// Returns true if the task has reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies a terminal outcome to this task.
    ///
    /// Has no effect if the task is already terminal; a task's terminal
    /// state is written exactly once.
    pub fn apply_outcome(&mut self, outcome: &TaskOutcome) {
        if self.is_terminal() {
            return;
        }
        self.status = outcome.status();
        self.finished_at = Some(Utc::now());
        match outcome {
            TaskOutcome::Succeeded(result) => {
                self.result = Some(result.text.clone());
                self.tokens_estimate = result.tokens_estimate;
                self.cost_estimate = result.cost_estimate;
            }
            TaskOutcome::Failed { kind, message } => {
                self.failure = Some(*kind);
                self.failure_message = Some(message.clone());
            }
            TaskOutcome::Cancelled => {}
        }
    }
}
