//! Ollama-compatible HTTP backend for local inference.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{AgentBackend, AgentReply, BackendFailure, InvocationRequest};

/// Default Ollama endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default local model.
pub const DEFAULT_MODEL: &str = "gpt-oss:20b";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Backend adapter for an Ollama-style `/api/generate` endpoint.
///
/// Local models are free, so the default cost rate is zero; a per-1k-token
/// rate can be set for hosted deployments.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    request_timeout: Duration,
    cost_per_1k_tokens: f64,
}

impl OllamaBackend {
    /// Creates a backend for the given endpoint and model.
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            request_timeout: Duration::from_secs(600),
            cost_per_1k_tokens: 0.0,
        }
    }

    /// Creates a backend with the default local endpoint and model.
    #[must_use]
    pub fn local() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_MODEL)
    }

    /// Sets the HTTP request deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the cost rate per thousand tokens.
    #[must_use]
    pub fn with_cost_per_1k_tokens(mut self, rate: f64) -> Self {
        self.cost_per_1k_tokens = rate;
        self
    }

    /// Estimates token usage at roughly four characters per token.
    fn estimate_tokens(prompt_chars: usize, response_chars: usize) -> u64 {
        ((prompt_chars + response_chars) / 4) as u64
    }

    /// Builds a reply from raw response text, rejecting empty output.
    fn reply_from_text(&self, prompt_chars: usize, text: String) -> Result<AgentReply, BackendFailure> {
        if text.trim().is_empty() {
            return Err(BackendFailure::InvalidResponse(
                "backend returned empty output".to_string(),
            ));
        }
        let tokens = Self::estimate_tokens(prompt_chars, text.len());
        let cost = (tokens as f64 / 1000.0) * self.cost_per_1k_tokens;
        Ok(AgentReply {
            text,
            tokens_estimate: tokens,
            cost_estimate: cost,
        })
    }

    fn map_transport_error(&self, err: &reqwest::Error) -> BackendFailure {
        if err.is_timeout() {
            BackendFailure::Timeout(self.request_timeout)
        } else {
            BackendFailure::Unreachable(err.to_string())
        }
    }
}

#[async_trait]
impl AgentBackend for OllamaBackend {
    async fn invoke(&self, request: &InvocationRequest) -> Result<AgentReply, BackendFailure> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            system: &request.system_prompt,
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        debug!(agent = %request.agent, model = %self.model, "Invoking backend");

        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendFailure::Unreachable(format!(
                "backend returned HTTP {status}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| BackendFailure::InvalidResponse(e.to_string()))?;

        let prompt_chars = request.prompt.len() + request.system_prompt.len();
        self.reply_from_text(prompt_chars, parsed.response)
    }
}
