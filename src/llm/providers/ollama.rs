//! Local Ollama provider (`POST /api/generate`, non-streaming).
//!
//! Ollama's generate endpoint takes a single prompt, so prior turns are
//! expected to be folded into the prompt by the caller. The system prompt is
//! sent in Ollama's own `system` field.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::config::OllamaConfig;
use crate::llm::{CompletionRequest, LlmResponse, LlmUsage, ProviderError};

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: usize,
}

impl OllamaProvider {
    pub fn new(config: &OllamaConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        })
    }

    /// `GET /api/tags` must answer 2xx within five seconds.
    pub async fn ping(&self) -> Result<(), ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| ProviderError::Request(format!("unreachable: {e}")))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Request(format!("HTTP {}", response.status())))
        }
    }

    pub async fn complete(&self, req: &CompletionRequest) -> Result<LlmResponse, ProviderError> {
        let payload = GenerateRequest {
            model: &self.model,
            prompt: &req.prompt,
            system: req.system.as_deref(),
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                top_p: self.top_p,
                num_predict: self.max_tokens,
            },
        };

        debug!(model = %self.model, prompt_len = req.prompt.len(), "sending Ollama request");
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full Ollama request payload");
        }

        let url = format!("{}/api/generate", self.base_url);
        let response = self.client.post(&url).json(&payload).send().await.map_err(|e| {
            error!(url = %url, error = %e, "Ollama request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            error!(%status, %message, "Ollama returned HTTP error");
            return Err(ProviderError::Request(format!("HTTP {status}: {message}")));
        }

        let parsed = response.json::<GenerateResponse>().await.map_err(|e| {
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        let text = parsed.response.trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::Request("empty response from Ollama".into()));
        }
        let usage = match (parsed.prompt_eval_count, parsed.eval_count) {
            (None, None) => None,
            (input, output) => Some(LlmUsage {
                input_tokens: input.unwrap_or(0),
                output_tokens: output.unwrap_or(0),
            }),
        };
        Ok(LlmResponse { text, usage })
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}
