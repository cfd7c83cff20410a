//! Mock backends for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::backend::{AgentBackend, AgentReply, BackendFailure, InvocationRequest};
use crate::stages::AgentKind;

/// A backend that replays scripted replies and records calls.
///
/// Per-agent scripts are consumed in order; once a script is exhausted the
/// fallback reply is returned. An optional delay simulates inference
/// latency.
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<AgentKind, VecDeque<Result<AgentReply, BackendFailure>>>>,
    fallback: Mutex<Result<AgentReply, BackendFailure>>,
    delay: Mutex<Duration>,
    calls: Mutex<Vec<AgentKind>>,
}

impl ScriptedBackend {
    /// Creates a backend whose fallback reply is a success with the given
    /// text and zero cost.
    #[must_use]
    pub fn always_succeeding(text: impl Into<String>) -> Self {
        Self::with_fallback(Ok(AgentReply {
            text: text.into(),
            tokens_estimate: 10,
            cost_estimate: 0.0,
        }))
    }

    /// Creates a backend whose fallback reply is the given failure.
    #[must_use]
    pub fn always_failing(failure: BackendFailure) -> Self {
        Self::with_fallback(Err(failure))
    }

    /// Creates a backend with an explicit fallback reply.
    #[must_use]
    pub fn with_fallback(fallback: Result<AgentReply, BackendFailure>) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: Mutex::new(fallback),
            delay: Mutex::new(Duration::ZERO),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queues one scripted reply for an agent, consumed before the fallback.
    pub fn script(&self, agent: AgentKind, reply: Result<AgentReply, BackendFailure>) {
        self.scripts.lock().entry(agent).or_default().push_back(reply);
    }

    /// Queues a scripted success with the given text and cost.
    pub fn script_success(&self, agent: AgentKind, text: impl Into<String>, cost: f64) {
        self.script(
            agent,
            Ok(AgentReply {
                text: text.into(),
                tokens_estimate: 10,
                cost_estimate: cost,
            }),
        );
    }

    /// Sets a simulated inference latency applied to every call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Returns the total number of invocations.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the agents invoked, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<AgentKind> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AgentBackend for ScriptedBackend {
    async fn invoke(&self, request: &InvocationRequest) -> Result<AgentReply, BackendFailure> {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().push(request.agent);

        if let Some(scripted) = self
            .scripts
            .lock()
            .get_mut(&request.agent)
            .and_then(VecDeque::pop_front)
        {
            return scripted;
        }
        self.fallback.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies_consumed_before_fallback() {
        let backend = ScriptedBackend::always_succeeding("fallback");
        backend.script(
            AgentKind::IdeaProcessor,
            Err(BackendFailure::Unreachable("down".to_string())),
        );

        let request = InvocationRequest::new(AgentKind::IdeaProcessor, "idea");
        assert!(backend.invoke(&request).await.is_err());
        let reply = backend.invoke(&request).await.unwrap();
        assert_eq!(reply.text, "fallback");
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_scripts_are_per_agent() {
        let backend = ScriptedBackend::always_succeeding("ok");
        backend.script_success(AgentKind::MarketResearch, "tam analysis", 0.25);

        let other = InvocationRequest::new(AgentKind::ContextBuilder, "idea");
        assert_eq!(backend.invoke(&other).await.unwrap().text, "ok");

        let scripted = InvocationRequest::new(AgentKind::MarketResearch, "idea");
        let reply = backend.invoke(&scripted).await.unwrap();
        assert_eq!(reply.text, "tam analysis");
        assert!((reply.cost_estimate - 0.25).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_calls_recorded_in_order() {
        let backend = ScriptedBackend::always_succeeding("ok");
        for agent in [AgentKind::IdeaProcessor, AgentKind::ContextBuilder] {
            let request = InvocationRequest::new(agent, "idea");
            let _ = backend.invoke(&request).await;
        }
        assert_eq!(
            backend.calls(),
            vec![AgentKind::IdeaProcessor, AgentKind::ContextBuilder]
        );
    }
}
