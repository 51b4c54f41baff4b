//! Ollama local model client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::traits::{CompletionRequest, CompletionResponse, LLMProvider, ProviderError, ProviderResult};

const DEFAULT_HOST: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3";

/// Client for Ollama's `/api/generate` endpoint.
///
/// The endpoint takes a single prompt, so the system message is prepended to it.
pub struct OllamaClient {
    base_url: String,
    http_client: Client,
    default_model: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: Client::new(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create from `OLLAMA_HOST`, falling back to localhost
    pub fn from_env() -> ProviderResult<Self> {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        Ok(Self::new(host))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    model: String,
    response: String,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Deserialize)]
struct OllamaError {
    error: String,
}

/// System message and prompt as one block of text
fn merge_system(system: Option<&str>, prompt: String) -> String {
    match system.filter(|s| !s.trim().is_empty()) {
        Some(system) => format!("{}\n\n{}", system, prompt),
        None => prompt,
    }
}

#[async_trait]
impl LLMProvider for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        let start = Instant::now();

        let body = GenerateRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            prompt: merge_system(request.system_prompt.as_deref(), request.user_text()),
            stream: false,
            options: GenerateOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
            },
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OllamaError>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("HTTP {}: {}", status.as_u16(), body));
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: GenerateResponse = response.json().await?;

        Ok(CompletionResponse {
            content: api_response.response,
            model: api_response.model,
            input_tokens: api_response.prompt_eval_count,
            output_tokens: api_response.eval_count,
            finish_reason: api_response.done_reason.unwrap_or_else(|| "unknown".to_string()),
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_is_prepended() {
        assert_eq!(merge_system(Some("Be brief."), "Q".into()), "Be brief.\n\nQ");
        assert_eq!(merge_system(None, "Q".into()), "Q");
        assert_eq!(merge_system(Some("  "), "Q".into()), "Q");
    }

    #[test]
    fn test_host_normalization() {
        let client = OllamaClient::new("http://gpu-box:11434/");
        assert_eq!(client.base_url, "http://gpu-box:11434");
        assert_eq!(client.default_model(), DEFAULT_MODEL);
    }
}
