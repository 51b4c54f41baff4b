//! Document question-answering benchmark for LLM providers
//!
//! This crate evaluates how well LLMs answer questions about documents found at
//! a link. Each input row names a link, a list of questions and their answer
//! keys; every configured (LLM, instruction style) pair answers the questions
//! and is scored against the keys.
//!
//! # Features
//!
//! - HTTP fetching with retries, content-type detection and HTML/PDF text extraction
//! - OpenAI, Anthropic, Gemini, Ollama and Groq providers behind one trait
//! - Row-wise or link-grouped evaluation with per-combination error isolation
//! - Case-insensitive sequence-matching similarity scores
//! - CSV result tables, JSON summaries and optional per-unit checkpoints
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use docqa_benchmark::{
//!     config::Config,
//!     fetch::HttpFetcher,
//!     providers::create_registry,
//!     records::{load_records_from_file, GroupingMode},
//!     reporting::write_table,
//!     runner::Evaluator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let plan = Config::load_or_default().plan()?;
//!     let records = load_records_from_file("questions.csv")?;
//!
//!     let fetcher = HttpFetcher::new(&plan.fetch)?;
//!     let registry = create_registry(&plan)?;
//!     let evaluator = Evaluator::new(plan, Arc::new(fetcher), registry)?;
//!
//!     let table = evaluator.run(&records, GroupingMode::PerRow).await;
//!     write_table("results.csv", &table)?;
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod fetch;
pub mod prompt;
pub mod providers;
pub mod records;
pub mod reporting;
pub mod runner;

pub use config::{Config, EvalPlan};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::analysis::{align_lines, partition, score, AnswerAligner, LineAligner};
    pub use crate::config::{Config, ConfigError, EvalPlan, InstructionStyle, LlmChoice, ProviderKind};
    pub use crate::fetch::{Document, DocumentFormat, DocumentSource, FetchError, HttpFetcher};
    pub use crate::prompt::build_prompt;
    pub use crate::providers::{
        create_registry, CompletionRequest, CompletionResponse, LLMProvider, Message,
        ProviderError, ProviderRegistry, ProviderResult,
    };
    pub use crate::records::{
        group_by_link, load_records_from_file, GroupingMode, LoadError, Record,
    };
    pub use crate::reporting::{print_console_report, write_table, JsonSummary};
    pub use crate::runner::{
        CellKey, ConsoleProgress, EvalCell, EvalTable, Evaluator, NoOpProgress, ProgressCallback,
    };
}
