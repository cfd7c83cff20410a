//! Core domain model: identifiers, statuses, tasks, projects, and views.

mod ids;
mod project;
mod status;
mod task;

pub use ids::{ProjectId, TaskId};
pub use project::{Project, ProjectView, StageRun, TaskView};
pub use status::{CompletionPolicy, ProjectStatus, StageRunStatus, TaskStatus};
pub use task::{AgentTask, FailureKind, TaskOutcome, TaskResult};
