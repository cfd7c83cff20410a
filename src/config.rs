//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::executor::RetryPolicy;

/// Tunables for the executor, worker pool, and event bus.
///
/// Defaults mirror the documented production settings: three attempts with
/// 2s-60s exponential backoff, four workers, and a 10 minute per-task
/// deadline sized for slow local inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum invocation attempts per task for transient failures,
    /// including the initial attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff between attempts.
    pub retry_base_delay: Duration,
    /// Cap applied to the backoff delay.
    pub retry_max_delay: Duration,
    /// Number of concurrent execution slots system-wide.
    pub worker_pool_size: usize,
    /// Capacity of the bounded ready queue; `submit` blocks when full.
    pub queue_capacity: usize,
    /// Hard deadline for a single invocation attempt.
    pub per_task_timeout: Duration,
    /// Bounded per-subscriber event buffer; excess events are dropped and
    /// flagged with an overflow marker.
    pub subscriber_buffer: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay: Duration::from_secs(2),
            retry_max_delay: Duration::from_secs(60),
            worker_pool_size: 4,
            queue_capacity: 16,
            per_task_timeout: Duration::from_secs(600),
            subscriber_buffer: 256,
        }
    }
}

impl OrchestratorConfig {
    /// Creates a config with the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts per task.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the base backoff delay.
    #[must_use]
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Sets the backoff delay cap.
    #[must_use]
    pub fn with_retry_max_delay(mut self, delay: Duration) -> Self {
        self.retry_max_delay = delay;
        self
    }

    /// Sets the worker pool size.
    #[must_use]
    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    /// Sets the ready-queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the per-attempt deadline.
    #[must_use]
    pub fn with_per_task_timeout(mut self, timeout: Duration) -> Self {
        self.per_task_timeout = timeout;
        self
    }

    /// Sets the per-subscriber event buffer size.
    #[must_use]
    pub fn with_subscriber_buffer(mut self, buffer: usize) -> Self {
        self.subscriber_buffer = buffer;
        self
    }

    /// Derives the retry policy handed to the executor.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(self.max_retries)
            .with_base_delay(self.retry_base_delay)
            .with_max_delay(self.retry_max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_settings() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_secs(2));
        assert_eq!(config.retry_max_delay, Duration::from_secs(60));
        assert_eq!(config.worker_pool_size, 4);
        assert_eq!(config.per_task_timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_builder_setters() {
        let config = OrchestratorConfig::new()
            .with_max_retries(5)
            .with_worker_pool_size(1)
            .with_queue_capacity(2)
            .with_subscriber_buffer(8);

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.worker_pool_size, 1);
        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.subscriber_buffer, 8);
    }

    #[test]
    fn test_retry_policy_derivation() {
        let config = OrchestratorConfig::new()
            .with_max_retries(2)
            .with_retry_base_delay(Duration::from_millis(5));
        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(5));
    }
}
