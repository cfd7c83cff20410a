//! # Ventureflow
//!
//! An orchestrator that carries a project idea through a fixed pipeline of
//! AI-agent stages.
//!
//! Ventureflow provides:
//!
//! - **Staged execution**: six ordered stages, each fanning out to a fixed
//!   roster of agent tasks with a per-stage completion policy
//! - **Contained failures**: per-attempt timeouts, exponential backoff with
//!   jitter for transient failures, and cost accounting per task
//! - **Bounded concurrency**: a fixed worker pool over a bounded ready
//!   queue that applies backpressure at submission
//! - **Ordered observability**: a per-project event stream with bounded
//!   subscriber buffers and explicit overflow markers
//! - **Cancellation handling**: cooperative cancellation that settles
//!   in-flight tasks without failing them
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ventureflow::prelude::*;
//! use std::sync::Arc;
//!
//! let backend = Arc::new(OllamaBackend::local());
//! let orchestrator = Orchestrator::new(OrchestratorConfig::default(), backend);
//!
//! let project = orchestrator.create_project("a marketplace for vintage synths");
//! let mut events = orchestrator.subscribe(project)?;
//! orchestrator.advance_stage(project)?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backend;
pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod executor;
pub mod machine;
pub mod orchestrator;
pub mod pool;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{
        AgentBackend, AgentReply, BackendFailure, InvocationRequest, OllamaBackend,
    };
    pub use crate::cancellation::CancelToken;
    pub use crate::config::OrchestratorConfig;
    pub use crate::core::{
        AgentTask, CompletionPolicy, FailureKind, Project, ProjectId, ProjectStatus, ProjectView,
        StageRunStatus, TaskId, TaskOutcome, TaskResult, TaskStatus, TaskView,
    };
    pub use crate::errors::OrchestrationError;
    pub use crate::events::{Event, EventKind, EventStream};
    pub use crate::orchestrator::Orchestrator;
    pub use crate::stages::{AgentKind, StageGraph, STAGE_COUNT};
}
