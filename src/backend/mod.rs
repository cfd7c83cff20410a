//! The agent backend adapter: a uniform call contract to an AI inference
//! endpoint.
//!
//! Backends are stateless from the orchestrator's perspective and must be
//! safe to invoke concurrently. Every call either yields text with usage
//! estimates or a typed [`BackendFailure`].

mod ollama;

pub use ollama::OllamaBackend;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::core::FailureKind;
use crate::stages::AgentKind;

/// Default sampling temperature for agent calls.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Default response token budget for agent calls.
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// One agent invocation request.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    /// The agent kind being invoked.
    pub agent: AgentKind,
    /// The user prompt (the project's idea text).
    pub prompt: String,
    /// The system prompt establishing the agent's role.
    pub system_prompt: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Response token budget.
    pub max_tokens: u32,
}

impl InvocationRequest {
    /// Builds a request with the agent's default system prompt and the
    /// standard sampling settings.
    #[must_use]
    pub fn new(agent: AgentKind, prompt: impl Into<String>) -> Self {
        Self {
            agent,
            prompt: prompt.into(),
            system_prompt: agent.system_prompt(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Overrides the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Overrides the response token budget.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A successful backend reply.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    /// Generated text.
    pub text: String,
    /// Estimated tokens used by the call.
    pub tokens_estimate: u64,
    /// Estimated cost of the call, in dollars.
    pub cost_estimate: f64,
}

/// A typed backend failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendFailure {
    /// The backend endpoint could not be reached.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The call exceeded its deadline.
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),

    /// The backend produced malformed or empty output.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

impl BackendFailure {
    /// Classifies this failure for task records and retry decisions.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Unreachable(_) => FailureKind::Unreachable,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::InvalidResponse(_) => FailureKind::InvalidResponse,
        }
    }

    /// Returns true if a retry may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }
}

/// Uniform call contract to an AI inference endpoint.
///
/// Implementations hold no shared mutable state; the same backend instance
/// is invoked concurrently by every worker slot.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Invokes an agent and returns its reply or a typed failure.
    async fn invoke(&self, request: &InvocationRequest) -> Result<AgentReply, BackendFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = InvocationRequest::new(AgentKind::MarketResearch, "an idea");
        assert!((request.temperature - DEFAULT_TEMPERATURE).abs() < f64::EPSILON);
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(request.system_prompt.contains("Market Research"));
    }

    #[test]
    fn test_request_overrides() {
        let request = InvocationRequest::new(AgentKind::IdeaProcessor, "x")
            .with_temperature(0.2)
            .with_max_tokens(512);
        assert!((request.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(request.max_tokens, 512);
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(
            BackendFailure::Unreachable("refused".into()).kind(),
            FailureKind::Unreachable
        );
        assert_eq!(
            BackendFailure::Timeout(Duration::from_secs(1)).kind(),
            FailureKind::Timeout
        );
        assert_eq!(
            BackendFailure::InvalidResponse("empty".into()).kind(),
            FailureKind::InvalidResponse
        );
        assert!(BackendFailure::Unreachable("x".into()).is_transient());
        assert!(!BackendFailure::InvalidResponse("x".into()).is_transient());
    }
}
