//! Test doubles for the orchestrator.

mod mocks;

pub use mocks::ScriptedBackend;
