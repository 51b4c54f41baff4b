//! LLM provider implementations and the label-to-provider registry

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod traits;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;
pub use traits::{
    CompletionRequest, CompletionResponse, LLMProvider, Message, ProviderError, ProviderResult,
};

use crate::config::{EvalPlan, LlmChoice, ProviderKind};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps each configured LLM label to the client that serves it.
///
/// Labels are routed once, when the registry is built; the evaluator only
/// ever looks clients up by label.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: IndexMap<String, Arc<dyn LLMProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client for a label, replacing any previous one
    pub fn register(&mut self, label: impl Into<String>, provider: Arc<dyn LLMProvider>) {
        self.providers.insert(label.into(), provider);
    }

    pub fn with_provider(
        mut self,
        label: impl Into<String>,
        provider: Arc<dyn LLMProvider>,
    ) -> Self {
        self.register(label, provider);
        self
    }

    pub fn get(&self, label: &str) -> Option<&Arc<dyn LLMProvider>> {
        self.providers.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.providers.contains_key(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Send one prompt to the LLM behind `llm.label` and return the raw reply text
    pub async fn call(
        &self,
        llm: &LlmChoice,
        system_message: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> ProviderResult<String> {
        let provider = self
            .get(&llm.label)
            .ok_or_else(|| ProviderError::UnknownLlm(llm.label.clone()))?;

        let mut request = CompletionRequest::new(vec![Message::user(prompt)], max_tokens)
            .with_model(&llm.model_id)
            .with_temperature(llm.temperature);
        if !system_message.trim().is_empty() {
            request = request.with_system(system_message);
        }

        let response = provider.complete(&request).await?;
        tracing::debug!(
            llm = %llm.label,
            provider = provider.name(),
            model = %response.model,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            latency_ms = response.latency_ms,
            "completion received"
        );
        Ok(response.content)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.providers.iter().map(|(label, p)| (label, p.name())))
            .finish()
    }
}

/// Create one client for a provider family from the environment
pub fn provider_from_env(kind: ProviderKind) -> ProviderResult<Arc<dyn LLMProvider>> {
    let provider: Arc<dyn LLMProvider> = match kind {
        ProviderKind::OpenAI => Arc::new(OpenAIClient::from_env()?),
        ProviderKind::Anthropic => Arc::new(AnthropicClient::from_env()?),
        ProviderKind::Gemini => Arc::new(GeminiClient::from_env()?),
        ProviderKind::Ollama => Arc::new(OllamaClient::from_env()?),
        ProviderKind::Groq => Arc::new(OpenAIClient::groq_from_env()?),
    };
    Ok(provider)
}

/// Build a registry covering every LLM in the plan.
///
/// Labels of the same family share a single client. Fails on the first
/// family whose credentials are missing.
pub fn create_registry(plan: &EvalPlan) -> ProviderResult<ProviderRegistry> {
    let mut clients: HashMap<ProviderKind, Arc<dyn LLMProvider>> = HashMap::new();
    let mut registry = ProviderRegistry::new();

    for llm in &plan.llms {
        let client = match clients.get(&llm.provider) {
            Some(client) => client.clone(),
            None => {
                let client = provider_from_env(llm.provider).map_err(|e| {
                    ProviderError::Config(format!("{} ({}): {}", llm.label, llm.provider, e))
                })?;
                clients.insert(llm.provider, client.clone());
                client
            }
        };
        tracing::debug!(llm = %llm.label, provider = %llm.provider, model = %llm.model_id, "registered LLM");
        registry.register(llm.label.clone(), client);
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every request and echoes the prompt back
    #[derive(Default)]
    struct EchoProvider {
        requests: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl LLMProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        fn default_model(&self) -> &str {
            "echo-1"
        }

        async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(CompletionResponse {
                content: request.user_text(),
                model: request.model.clone().unwrap_or_default(),
                input_tokens: 1,
                output_tokens: 1,
                finish_reason: "stop".into(),
                latency_ms: 0,
            })
        }
    }

    fn choice(label: &str) -> LlmChoice {
        LlmChoice {
            label: label.into(),
            model_id: "model-x".into(),
            provider: ProviderKind::OpenAI,
            temperature: 0.3,
        }
    }

    #[tokio::test]
    async fn test_call_routes_by_label() {
        let echo = Arc::new(EchoProvider::default());
        let registry = ProviderRegistry::new().with_provider("TEST", echo.clone());

        let reply = registry
            .call(&choice("TEST"), "be brief", "the prompt", 64)
            .await
            .unwrap();
        assert_eq!(reply, "the prompt");

        let requests = echo.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model.as_deref(), Some("model-x"));
        assert_eq!(requests[0].temperature, Some(0.3));
        assert_eq!(requests[0].system_prompt.as_deref(), Some("be brief"));
        assert_eq!(requests[0].max_tokens, 64);
    }

    #[tokio::test]
    async fn test_call_unknown_label() {
        let registry = ProviderRegistry::new();
        let err = registry
            .call(&choice("NOPE"), "", "p", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownLlm(label) if label == "NOPE"));
    }

    #[tokio::test]
    async fn test_blank_system_message_is_omitted() {
        let echo = Arc::new(EchoProvider::default());
        let registry = ProviderRegistry::new().with_provider("TEST", echo.clone());
        registry.call(&choice("TEST"), "  ", "p", 10).await.unwrap();
        assert!(echo.requests.lock().unwrap()[0].system_prompt.is_none());
    }

    #[test]
    fn test_registry_labels_keep_order() {
        let echo: Arc<dyn LLMProvider> = Arc::new(EchoProvider::default());
        let registry = ProviderRegistry::new()
            .with_provider("B", echo.clone())
            .with_provider("A", echo);
        assert_eq!(registry.labels().collect::<Vec<_>>(), vec!["B", "A"]);
        assert!(registry.contains("A"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_ollama_needs_no_credentials() {
        let provider = provider_from_env(ProviderKind::Ollama).unwrap();
        assert_eq!(provider.name(), "ollama");
    }
}
