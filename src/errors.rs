//! Orchestration error taxonomy.
//!
//! These errors surface synchronously to callers of the facade. Task-level
//! backend failures never appear here; they are contained by the executor
//! and reported as terminal task status plus an event.

use thiserror::Error;

use crate::core::{ProjectId, ProjectStatus};

/// Errors returned synchronously by orchestrator operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestrationError {
    /// `advance_stage` was called while the current stage run is still active.
    #[error("project {project} is not ready to advance: stage {stage} is still active")]
    NotReady {
        /// The project that was asked to advance.
        project: ProjectId,
        /// The stage that is still running.
        stage: u32,
    },

    /// The project already reached `Completed` or `Failed`.
    #[error("project {project} is already terminal ({status})")]
    TerminalProject {
        /// The project in question.
        project: ProjectId,
        /// Its terminal status.
        status: ProjectStatus,
    },

    /// No project with the given id exists.
    #[error("unknown project {0}")]
    UnknownProject(ProjectId),

    /// A stage index outside `1..=6` was used.
    #[error("unknown stage {0}, valid stages are 1..=6")]
    UnknownStage(u32),

    /// The orchestrator has been shut down and accepts no new work.
    #[error("orchestrator is shut down")]
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = ProjectId::new();
        let err = OrchestrationError::NotReady {
            project: id,
            stage: 2,
        };
        assert!(err.to_string().contains("not ready"));
        assert!(err.to_string().contains(&id.to_string()));

        assert_eq!(
            OrchestrationError::UnknownStage(9).to_string(),
            "unknown stage 9, valid stages are 1..=6"
        );
    }

    #[test]
    fn test_terminal_project_reports_status() {
        let err = OrchestrationError::TerminalProject {
            project: ProjectId::new(),
            status: ProjectStatus::Failed,
        };
        assert!(err.to_string().contains("failed"));
    }
}
