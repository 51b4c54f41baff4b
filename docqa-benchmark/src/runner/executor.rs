//! Evaluation driver: fetch, prompt, call, align and score every combination

use std::sync::Arc;

use crate::analysis::{partition, score, AnswerAligner, LineAligner};
use crate::config::{ConfigError, EvalPlan, InstructionStyle, LlmChoice};
use crate::fetch::{Document, DocumentSource};
use crate::prompt::build_prompt;
use crate::providers::{ProviderError, ProviderRegistry};
use crate::records::{group_by_link, Group, GroupingMode, Record, MAX_GROUP_MEMBERS};

use super::progress::{NoOpProgress, ProgressCallback};
use super::results::{CellKey, EvalCell, EvalTable};

/// Runs the (record or group) x LLM x style matrix for one evaluation.
///
/// Records are processed sequentially in input order. A failed fetch turns every
/// cell of the affected record or group into an error; a failed LLM call only
/// affects its own combination.
pub struct Evaluator {
    plan: EvalPlan,
    source: Arc<dyn DocumentSource>,
    providers: ProviderRegistry,
    aligner: Arc<dyn AnswerAligner>,
    progress: Arc<dyn ProgressCallback>,
}

impl Evaluator {
    /// Create an evaluator; fails before any fetch if an LLM in the plan has no provider
    pub fn new(
        plan: EvalPlan,
        source: Arc<dyn DocumentSource>,
        providers: ProviderRegistry,
    ) -> Result<Self, ConfigError> {
        if plan.llms.is_empty() {
            return Err(ConfigError::NoModels);
        }
        if plan.styles.is_empty() {
            return Err(ConfigError::NoInstructions);
        }
        if let Some(llm) = plan.llms.iter().find(|llm| !providers.contains(&llm.label)) {
            return Err(ConfigError::MissingProvider(llm.label.clone()));
        }

        Ok(Self {
            plan,
            source,
            providers,
            aligner: Arc::new(LineAligner),
            progress: Arc::new(NoOpProgress),
        })
    }

    pub fn with_aligner(mut self, aligner: Arc<dyn AnswerAligner>) -> Self {
        self.aligner = aligner;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn plan(&self) -> &EvalPlan {
        &self.plan
    }

    /// Evaluate every record and return the filled table
    pub async fn run(&self, records: &[Record], mode: GroupingMode) -> EvalTable {
        let mut table = EvalTable::new(&self.plan, records);

        tracing::info!(
            "Evaluating {} records x {} combinations ({:?})",
            records.len(),
            self.plan.combination_count(),
            mode
        );

        match mode {
            GroupingMode::PerRow => {
                let total = records.len();
                for (i, record) in records.iter().enumerate() {
                    self.progress.on_unit_start(&record.link, 1);
                    self.evaluate_record(record, &mut table).await;
                    self.progress.on_unit_complete(&table, i + 1, total);
                }
            }
            GroupingMode::ByLink => {
                let groups = group_by_link(records, MAX_GROUP_MEMBERS);
                let total = groups.len();
                // Groups of one link are adjacent, so one cached document suffices
                let mut cached: Option<(&str, Result<Document, String>)> = None;

                for (i, group) in groups.iter().enumerate() {
                    self.progress.on_unit_start(group.link, group.members.len());

                    let stale = !matches!(&cached, Some((link, _)) if *link == group.link);
                    if stale {
                        cached = Some((group.link, self.load_document(group.link).await));
                    }
                    if let Some((_, document)) = &cached {
                        self.evaluate_group(group, document, &mut table).await;
                    }

                    self.progress.on_unit_complete(&table, i + 1, total);
                }
            }
        }

        table
    }

    /// Fetch a link, folding "no document" and fetch errors into an error message
    async fn load_document(&self, link: &str) -> Result<Document, String> {
        match self.source.fetch(link).await {
            Ok(Some(document)) => Ok(document),
            Ok(None) => {
                tracing::warn!("No document at {}", link);
                Err(format!("document not found: {}", link))
            }
            Err(e) => {
                tracing::error!("Fetch failed for {}: {}", link, e);
                Err(e.to_string())
            }
        }
    }

    async fn evaluate_record(&self, record: &Record, table: &mut EvalTable) {
        let document = match self.load_document(&record.link).await {
            Ok(document) => document,
            Err(message) => {
                self.fail_all(&[record], &message, table);
                return;
            }
        };

        let prompt = build_prompt(Some(record.term.as_str()), &document.text, &record.questions);

        for (llm, style) in self.plan.combinations() {
            let key = CellKey::new(&llm.label, &style.name);
            let cell = match self.ask(llm, style, &prompt, record.question_count()).await {
                Ok(answers) => {
                    let similarity = score(&answers, &record.answer_keys);
                    EvalCell::scored(answers, similarity)
                }
                Err(e) => {
                    tracing::error!("Row {} {} failed: {}", record.index, key, e);
                    EvalCell::failed(e.to_string())
                }
            };
            self.store(record, &key, cell, table);
        }
    }

    async fn evaluate_group(
        &self,
        group: &Group<'_>,
        document: &Result<Document, String>,
        table: &mut EvalTable,
    ) {
        let document = match document {
            Ok(document) => document,
            Err(message) => {
                self.fail_all(&group.members, message, table);
                return;
            }
        };

        let questions = group.flattened_questions();
        let counts = group.question_counts();
        let prompt = build_prompt(None, &document.text, &questions);

        for (llm, style) in self.plan.combinations() {
            let key = CellKey::new(&llm.label, &style.name);
            match self.ask(llm, style, &prompt, questions.len()).await {
                Ok(answers) => {
                    let slices = partition(&answers, &counts);
                    for (member, slice) in group.members.iter().zip(slices) {
                        let similarity = score(slice, &member.answer_keys);
                        self.store(member, &key, EvalCell::scored(slice.to_vec(), similarity), table);
                    }
                }
                Err(e) => {
                    tracing::error!("Group {} {} failed: {}", group.link, key, e);
                    let message = e.to_string();
                    for member in &group.members {
                        self.store(member, &key, EvalCell::failed(message.clone()), table);
                    }
                }
            }
        }
    }

    /// One LLM call, aligned to `expected` answers
    async fn ask(
        &self,
        llm: &LlmChoice,
        style: &InstructionStyle,
        prompt: &str,
        expected: usize,
    ) -> Result<Vec<String>, ProviderError> {
        tracing::debug!(
            "Calling {} ({}) with style '{}'",
            llm.label,
            llm.model_id,
            style.name
        );
        let reply = self
            .providers
            .call(llm, &style.system_message, prompt, self.plan.max_tokens)
            .await?;
        Ok(self.aligner.align(&reply, expected))
    }

    fn fail_all(&self, records: &[&Record], message: &str, table: &mut EvalTable) {
        for record in records {
            for (llm, style) in self.plan.combinations() {
                let key = CellKey::new(&llm.label, &style.name);
                self.store(record, &key, EvalCell::failed(message), table);
            }
        }
    }

    fn store(&self, record: &Record, key: &CellKey, cell: EvalCell, table: &mut EvalTable) {
        self.progress.on_cell_complete(record, key, &cell);
        table.set(record, key, cell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::fetch::{DocumentFormat, FetchResult};
    use crate::providers::{CompletionRequest, CompletionResponse, LLMProvider, ProviderResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeSource {
        pages: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn with_page(url: &str, text: &str) -> Self {
            Self {
                pages: HashMap::from([(url.to_string(), text.to_string())]),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentSource for FakeSource {
        async fn fetch(&self, url: &str) -> FetchResult<Option<Document>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.pages.get(url).map(|text| Document {
                text: text.clone(),
                format: DocumentFormat::PlainText,
                source_url: url.to_string(),
            }))
        }
    }

    struct FakeLlm {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeLlm {
        fn replying(reply: &str) -> Self {
            Self {
                reply: reply.into(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for FakeLlm {
        fn name(&self) -> &str {
            "fake"
        }

        fn default_model(&self) -> &str {
            "fake-1"
        }

        async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
            self.prompts.lock().unwrap().push(request.user_text());
            Ok(CompletionResponse {
                content: self.reply.clone(),
                model: "fake-1".into(),
                input_tokens: 0,
                output_tokens: 0,
                finish_reason: "stop".into(),
                latency_ms: 0,
            })
        }
    }

    fn plan() -> EvalPlan {
        EvalPlan::new(
            vec![LlmChoice {
                label: "TEST".into(),
                model_id: "fake-1".into(),
                provider: ProviderKind::Ollama,
                temperature: 0.0,
            }],
            vec![InstructionStyle {
                name: "plain".into(),
                system_message: "Answer.".into(),
            }],
        )
    }

    fn record(index: usize, link: &str, questions: &[&str], answers: &[&str]) -> Record {
        Record::new(
            index,
            "",
            questions.iter().map(|s| s.to_string()).collect(),
            link,
            answers.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_missing_provider_is_rejected_up_front() {
        let source = Arc::new(FakeSource::with_page("http://a", "doc"));
        let result = Evaluator::new(plan(), source, ProviderRegistry::new());
        assert!(matches!(result, Err(ConfigError::MissingProvider(label)) if label == "TEST"));
    }

    #[tokio::test]
    async fn test_group_mode_fetches_each_link_once() {
        let source = Arc::new(FakeSource::with_page("http://a", "doc"));
        let llm = Arc::new(FakeLlm::replying("A1\nA2\nB1"));
        let registry = ProviderRegistry::new().with_provider("TEST", llm.clone());
        let evaluator = Evaluator::new(plan(), source.clone(), registry).unwrap();

        let records = vec![
            record(0, "http://a", &["Q1", "Q2"], &["A1", "A2"]),
            record(1, "http://a", &["Q3"], &["B1"]),
        ];
        let table = evaluator.run(&records, GroupingMode::ByLink).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(llm.prompts.lock().unwrap().len(), 1);

        let key = CellKey::new("TEST", "plain");
        assert_eq!(table.get(0, &key).unwrap().result_text(), "A1 | A2");
        assert_eq!(table.get(1, &key).unwrap().result_text(), "B1");
        assert_eq!(table.get(1, &key).unwrap().similarity(), 1.0);
    }

    #[tokio::test]
    async fn test_large_link_group_is_split_and_fetched_once() {
        let source = Arc::new(FakeSource::with_page("http://a", "doc"));
        let llm = Arc::new(FakeLlm::replying("A"));
        let registry = ProviderRegistry::new().with_provider("TEST", llm.clone());
        let evaluator = Evaluator::new(plan(), source.clone(), registry).unwrap();

        let records: Vec<Record> = (0..7).map(|i| record(i, "http://a", &["Q"], &["A"])).collect();
        let table = evaluator.run(&records, GroupingMode::ByLink).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(llm.prompts.lock().unwrap().len(), 2);
        let key = CellKey::new("TEST", "plain");
        assert!(table.rows().all(|row| row.cell(&key).is_some()));
    }

    #[tokio::test]
    async fn test_missing_document_marks_every_cell() {
        let source = Arc::new(FakeSource::with_page("http://a", "doc"));
        let llm = Arc::new(FakeLlm::replying("A"));
        let registry = ProviderRegistry::new().with_provider("TEST", llm.clone());
        let evaluator = Evaluator::new(plan(), source, registry).unwrap();

        let records = vec![record(0, "http://gone", &["Q"], &["A"])];
        let table = evaluator.run(&records, GroupingMode::PerRow).await;

        let cell = table.get(0, &CellKey::new("TEST", "plain")).unwrap();
        assert_eq!(cell.result_text(), "Error: document not found: http://gone");
        assert_eq!(cell.similarity(), 0.0);
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_row_prompt_carries_term() {
        let source = Arc::new(FakeSource::with_page("http://a", "doc"));
        let llm = Arc::new(FakeLlm::replying("A"));
        let registry = ProviderRegistry::new().with_provider("TEST", llm.clone());
        let evaluator = Evaluator::new(plan(), source, registry).unwrap();

        let mut rec = record(0, "http://a", &["Q"], &["A"]);
        rec.term = "Lease".into();
        evaluator.run(&[rec], GroupingMode::PerRow).await;

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].starts_with("Term: Lease\n"));
    }

    struct SemicolonAligner;

    impl AnswerAligner for SemicolonAligner {
        fn align(&self, response: &str, expected: usize) -> Vec<String> {
            response
                .split(';')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .take(expected)
                .collect()
        }
    }

    #[tokio::test]
    async fn test_custom_aligner_splits_reply() {
        let source = Arc::new(FakeSource::with_page("http://a", "doc"));
        let llm = Arc::new(FakeLlm::replying("A1; A2"));
        let registry = ProviderRegistry::new().with_provider("TEST", llm.clone());
        let evaluator = Evaluator::new(plan(), source, registry)
            .unwrap()
            .with_aligner(Arc::new(SemicolonAligner));

        let records = vec![record(0, "http://a", &["Q1", "Q2"], &["A1", "A2"])];
        let table = evaluator.run(&records, GroupingMode::PerRow).await;

        let cell = table.get(0, &CellKey::new("TEST", "plain")).unwrap();
        assert_eq!(cell.result_text(), "A1 | A2");
        assert_eq!(cell.similarity(), 1.0);
    }
}
