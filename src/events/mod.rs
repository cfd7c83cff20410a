//! Progress events and the per-project event bus.

mod bus;

pub use bus::{BusMetrics, EventBus, EventStream};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{FailureKind, ProjectId, TaskId};
use crate::stages::AgentKind;

/// One progress event in a project's ordered stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The project this event belongs to.
    pub project: ProjectId,
    /// Per-project sequence number, strictly increasing in production order.
    pub seq: u64,
    /// When the event was produced.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
}

impl Event {
    /// Returns true for the overflow marker.
    #[must_use]
    pub fn is_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow { .. })
    }
}

/// The kinds of progress events a project produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A task made its first invocation attempt.
    TaskStarted {
        /// The task.
        task: TaskId,
        /// Its agent kind.
        agent: AgentKind,
    },
    /// A task is backing off before another attempt.
    TaskRetrying {
        /// The task.
        task: TaskId,
        /// Its agent kind.
        agent: AgentKind,
        /// Attempts completed so far.
        attempt: u32,
        /// Backoff delay in milliseconds.
        delay_ms: u64,
    },
    /// A task reached a usable result.
    TaskSucceeded {
        /// The task.
        task: TaskId,
        /// Its agent kind.
        agent: AgentKind,
        /// Cost estimate for the call.
        cost_estimate: f64,
    },
    /// A task failed permanently.
    TaskFailed {
        /// The task.
        task: TaskId,
        /// Its agent kind.
        agent: AgentKind,
        /// The last failure observed.
        failure: FailureKind,
    },
    /// A stage run satisfied its completion policy.
    StageCompleted {
        /// The stage (1-based).
        stage: u32,
    },
    /// A stage run can no longer satisfy its completion policy.
    StageFailed {
        /// The stage (1-based).
        stage: u32,
    },
    /// All six stages finished.
    ProjectCompleted,
    /// The project failed or was cancelled.
    ProjectFailed,
    /// This subscriber's buffer overflowed and events were dropped; the
    /// collaborator should re-fetch a snapshot.
    SubscriberOverflow {
        /// Number of events dropped in this overflow episode.
        dropped: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_serializes_with_type_tag() {
        let kind = EventKind::StageCompleted { stage: 3 };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "stage_completed");
        assert_eq!(json["stage"], 3);
    }

    #[test]
    fn test_overflow_marker_detection() {
        let event = Event {
            project: ProjectId::new(),
            seq: 7,
            timestamp: Utc::now(),
            kind: EventKind::SubscriberOverflow { dropped: 12 },
        };
        assert!(event.is_overflow());
    }

    #[test]
    fn test_task_event_roundtrip() {
        let kind = EventKind::TaskFailed {
            task: TaskId::new(),
            agent: AgentKind::FullStackDev,
            failure: FailureKind::Timeout,
        };
        let json = serde_json::to_string(&kind).unwrap();
        let back: EventKind = serde_json::from_str(&json).unwrap();
        assert_eq!(kind, back);
    }
}
