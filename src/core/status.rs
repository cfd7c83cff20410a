//! Status enums for projects, tasks, and stage runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The overall lifecycle status of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Created but no stage has been dispatched yet.
    Draft,
    /// A stage is currently executing.
    InProgress,
    /// The current stage finished and the next one has not been dispatched.
    StageComplete,
    /// All six stages finished.
    Completed,
    /// A stage failed permanently or the project was cancelled.
    Failed,
}

impl ProjectStatus {
    /// Returns true if no further transition can occur.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::InProgress => write!(f, "in_progress"),
            Self::StageComplete => write!(f, "stage_complete"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The execution status of a single agent task.
///
/// Transitions are monotonic except the `Retrying -> Running` loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued, not yet picked up by a worker.
    Pending,
    /// An invocation attempt is in flight.
    Running,
    /// Waiting out a backoff delay before the next attempt.
    Retrying,
    /// The backend returned a usable result.
    Succeeded,
    /// Retries exhausted or a permanent backend failure.
    Failed,
    /// Cancelled cooperatively before reaching a result.
    Cancelled,
}

impl TaskStatus {
    /// Returns true if no further transition can occur.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Retrying => write!(f, "retrying"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Derived status of a stage run, computed from its child tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRunStatus {
    /// At least one child task is non-terminal.
    Active,
    /// The stage's completion policy was satisfied.
    Succeeded,
    /// The stage's completion policy can no longer be satisfied.
    Failed,
}

impl StageRunStatus {
    /// Returns true if no further transition can occur.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for StageRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Rule determining when a stage run is considered done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Every required task must succeed; the first permanent failure fails the stage.
    AllMustSucceed,
    /// The stage succeeds once every task is terminal, regardless of outcome mix.
    BestEffort,
}

impl fmt::Display for CompletionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllMustSucceed => write!(f, "all_must_succeed"),
            Self::BestEffort => write!(f, "best_effort"),
        }
    }
}
