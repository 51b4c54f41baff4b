//! Configuration management for the document QA benchmark
//!
//! Loads the model catalog, instruction styles and run settings from TOML (or the
//! legacy JSON layout) and resolves them into an immutable [`EvalPlan`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// LLM label -> provider model id
    #[serde(default)]
    pub models: IndexMap<String, String>,
    /// Instruction style name -> system message
    #[serde(default)]
    pub instructions: IndexMap<String, String>,
    /// LLM label -> sampling temperature
    #[serde(default)]
    pub temperatures: IndexMap<String, f32>,
    /// LLM label -> provider family, when the label prefix is not enough
    #[serde(default)]
    pub providers: IndexMap<String, String>,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// Which LLMs and styles take part in a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Selected LLM labels (empty = every declared model)
    #[serde(default)]
    pub llms: Vec<String>,
    /// Selected instruction styles (empty = every declared style)
    #[serde(default)]
    pub styles: Vec<String>,
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Document fetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl FetchConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

fn default_temperature() -> f32 { 0.7 }
fn default_max_tokens() -> u32 { 2048 }
fn default_attempts() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 2000 }

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            llms: Vec::new(),
            styles: Vec::new(),
            default_temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_ms: None,
        }
    }
}

/// Provider family an LLM label is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
    Gemini,
    Ollama,
    Groq,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Groq => "groq",
        }
    }

    /// Infer the family from a label such as `GPT_4` or `CLAUDE_HAIKU`
    pub fn infer_from_label(label: &str) -> Option<Self> {
        let upper = label.to_uppercase();
        if upper.starts_with("GPT") {
            Some(ProviderKind::OpenAI)
        } else if upper.starts_with("CLAUDE") {
            Some(ProviderKind::Anthropic)
        } else if upper.starts_with("GEMINI") {
            Some(ProviderKind::Gemini)
        } else if upper.starts_with("OLLAMA") {
            Some(ProviderKind::Ollama)
        } else if upper.starts_with("GROQ") {
            Some(ProviderKind::Groq)
        } else {
            None
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "gpt" => Ok(ProviderKind::OpenAI),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "ollama" => Ok(ProviderKind::Ollama),
            "groq" => Ok(ProviderKind::Groq),
            other => Err(ConfigError::UnknownProvider {
                label: String::new(),
                provider: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One LLM selected for a run
#[derive(Debug, Clone, PartialEq)]
pub struct LlmChoice {
    pub label: String,
    pub model_id: String,
    pub provider: ProviderKind,
    pub temperature: f32,
}

/// A named system-message variant
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionStyle {
    pub name: String,
    pub system_message: String,
}

/// Resolved, immutable settings for a single evaluation run
#[derive(Debug, Clone)]
pub struct EvalPlan {
    pub llms: Vec<LlmChoice>,
    pub styles: Vec<InstructionStyle>,
    pub max_tokens: u32,
    pub fetch: FetchConfig,
}

impl EvalPlan {
    /// Build a plan directly, bypassing file configuration
    pub fn new(llms: Vec<LlmChoice>, styles: Vec<InstructionStyle>) -> Self {
        Self {
            llms,
            styles,
            max_tokens: default_max_tokens(),
            fetch: FetchConfig::default(),
        }
    }

    /// Every (LLM, style) pair in output column order
    pub fn combinations(&self) -> impl Iterator<Item = (&LlmChoice, &InstructionStyle)> {
        self.llms
            .iter()
            .flat_map(move |llm| self.styles.iter().map(move |style| (llm, style)))
    }

    pub fn combination_count(&self) -> usize {
        self.llms.len() * self.styles.len()
    }
}

impl Config {
    /// Load configuration from a TOML file, or JSON when the extension is `.json`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Parse configuration from a JSON string (`info.json` layout)
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from the default config locations or return defaults
    pub fn load_or_default() -> Self {
        let config_paths = [
            "config/eval.toml",
            "docqa-benchmark/config/eval.toml",
            "info.json",
        ];

        for path in &config_paths {
            if let Ok(config) = Self::from_file(path) {
                tracing::info!("Loaded configuration from {}", path);
                return config;
            }
        }

        tracing::info!("Using default configuration");
        Self::default()
    }

    /// Save configuration to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    /// Temperature for an LLM label
    pub fn temperature_for(&self, label: &str) -> f32 {
        self.temperatures
            .get(label)
            .copied()
            .unwrap_or(self.evaluation.default_temperature)
    }

    /// Provider family for an LLM label
    pub fn provider_for(&self, label: &str) -> Result<ProviderKind, ConfigError> {
        match self.providers.get(label) {
            Some(name) => name.parse().map_err(|_| ConfigError::UnknownProvider {
                label: label.to_string(),
                provider: name.clone(),
            }),
            None => ProviderKind::infer_from_label(label).ok_or_else(|| {
                ConfigError::UnknownProvider {
                    label: label.to_string(),
                    provider: "<none>".to_string(),
                }
            }),
        }
    }

    /// Resolve the selected LLMs and styles into an [`EvalPlan`]
    pub fn plan(&self) -> Result<EvalPlan, ConfigError> {
        let llm_labels: Vec<String> = if self.evaluation.llms.is_empty() {
            self.models.keys().cloned().collect()
        } else {
            self.evaluation.llms.clone()
        };
        let style_names: Vec<String> = if self.evaluation.styles.is_empty() {
            self.instructions.keys().cloned().collect()
        } else {
            self.evaluation.styles.clone()
        };

        if llm_labels.is_empty() {
            return Err(ConfigError::NoModels);
        }
        if style_names.is_empty() {
            return Err(ConfigError::NoInstructions);
        }

        let mut llms = Vec::with_capacity(llm_labels.len());
        for label in llm_labels {
            let model_id = self
                .models
                .get(&label)
                .ok_or_else(|| ConfigError::UnknownModel(label.clone()))?
                .clone();
            llms.push(LlmChoice {
                provider: self.provider_for(&label)?,
                temperature: self.temperature_for(&label),
                label,
                model_id,
            });
        }

        let mut styles = Vec::with_capacity(style_names.len());
        for name in style_names {
            let system_message = self
                .instructions
                .get(&name)
                .ok_or_else(|| ConfigError::MissingInstruction(name.clone()))?
                .clone();
            styles.push(InstructionStyle {
                name,
                system_message,
            });
        }

        Ok(EvalPlan {
            llms,
            styles,
            max_tokens: self.evaluation.max_tokens,
            fetch: self.fetch.clone(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut models = IndexMap::new();
        models.insert("GPT_4".to_string(), "gpt-4o".to_string());
        models.insert("CLAUDE".to_string(), "claude-3-5-sonnet-20240620".to_string());
        models.insert("GEMINI".to_string(), "gemini-1.5-pro".to_string());

        let mut instructions = IndexMap::new();
        instructions.insert(
            "legal".to_string(),
            "You are a legal analyst. Answer each numbered question on its own line, \
             in order, using only the provided context."
                .to_string(),
        );
        instructions.insert(
            "data".to_string(),
            "You are a precise data extraction assistant. Reply with one short answer per \
             line, in question order, with no numbering or commentary."
                .to_string(),
        );

        let temperatures = models
            .keys()
            .map(|label| (label.clone(), default_temperature()))
            .collect();

        Self {
            models,
            instructions,
            temperatures,
            providers: IndexMap::new(),
            evaluation: EvaluationConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown LLM label: {0}")]
    UnknownModel(String),

    #[error("Missing instruction style: {0}")]
    MissingInstruction(String),

    #[error("Cannot route LLM '{label}' to a provider (got '{provider}')")]
    UnknownProvider { label: String, provider: String },

    #[error("No provider registered for LLM label: {0}")]
    MissingProvider(String),

    #[error("No models configured")]
    NoModels,

    #[error("No instruction styles configured")]
    NoInstructions,
}
