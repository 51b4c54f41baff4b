//! Per-record evaluation results

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::EvalPlan;
use crate::records::Record;

/// Identifies one (LLM, instruction style) combination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub llm: String,
    pub style: String,
}

impl CellKey {
    pub fn new(llm: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            llm: llm.into(),
            style: style.into(),
        }
    }

    pub fn result_column(&self) -> String {
        format!("Result_{}_{}", self.llm, self.style)
    }

    pub fn similarity_column(&self) -> String {
        format!("Similarity_{}_{}", self.llm, self.style)
    }
}

impl std::fmt::Display for CellKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.llm, self.style)
    }
}

/// Outcome of one combination for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvalCell {
    Scored { answers: Vec<String>, similarity: f64 },
    Failed { message: String },
}

impl EvalCell {
    pub fn scored(answers: Vec<String>, similarity: f64) -> Self {
        EvalCell::Scored {
            answers,
            similarity: similarity.clamp(0.0, 1.0),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        EvalCell::Failed {
            message: message.into(),
        }
    }

    /// Text for the `Result_*` column
    pub fn result_text(&self) -> String {
        match self {
            EvalCell::Scored { answers, .. } => answers.join(" | "),
            EvalCell::Failed { message } => format!("Error: {}", message),
        }
    }

    /// Value for the `Similarity_*` column; always 0.0 for errors
    pub fn similarity(&self) -> f64 {
        match self {
            EvalCell::Scored { similarity, .. } => *similarity,
            EvalCell::Failed { .. } => 0.0,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, EvalCell::Failed { .. })
    }
}

/// One input record with the cells filled in so far
#[derive(Debug, Clone)]
pub struct RecordResult {
    pub record: Record,
    pub cells: IndexMap<CellKey, EvalCell>,
}

impl RecordResult {
    pub fn cell(&self, key: &CellKey) -> Option<&EvalCell> {
        self.cells.get(key)
    }
}

/// The output table: every input record plus one cell per combination.
///
/// Cells are written once; a second write to the same cell is ignored.
#[derive(Debug, Clone)]
pub struct EvalTable {
    keys: Vec<CellKey>,
    rows: IndexMap<usize, RecordResult>,
}

impl EvalTable {
    pub fn new(plan: &EvalPlan, records: &[Record]) -> Self {
        let keys = plan
            .combinations()
            .map(|(llm, style)| CellKey::new(&llm.label, &style.name))
            .collect();
        let rows = records
            .iter()
            .map(|record| {
                (
                    record.index,
                    RecordResult {
                        record: record.clone(),
                        cells: IndexMap::new(),
                    },
                )
            })
            .collect();
        Self { keys, rows }
    }

    /// Combination keys in output column order
    pub fn keys(&self) -> &[CellKey] {
        &self.keys
    }

    pub fn rows(&self) -> impl Iterator<Item = &RecordResult> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Store a cell. Returns `false` if the record is unknown or the cell was already set.
    pub fn set(&mut self, record: &Record, key: &CellKey, cell: EvalCell) -> bool {
        let Some(row) = self.rows.get_mut(&record.index) else {
            tracing::warn!("No output row for record {}", record.index);
            return false;
        };
        if row.cells.contains_key(key) {
            tracing::warn!("Cell {} of row {} already written", key, record.index);
            return false;
        }
        row.cells.insert(key.clone(), cell);
        true
    }

    pub fn get(&self, record_index: usize, key: &CellKey) -> Option<&EvalCell> {
        self.rows.get(&record_index).and_then(|row| row.cell(key))
    }

    /// Every written cell for one combination, in row order
    pub fn column(&self, key: &CellKey) -> impl Iterator<Item = &EvalCell> + '_ {
        let key = key.clone();
        self.rows.values().filter_map(move |row| row.cells.get(&key))
    }
}
