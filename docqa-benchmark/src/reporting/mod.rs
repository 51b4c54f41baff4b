//! Results reporting

pub mod table;

pub use table::{write_table, write_table_to};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::records::GroupingMode;
use crate::runner::EvalTable;

/// JSON summary export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSummary {
    pub run_id: String,
    pub timestamp: String,
    pub total_records: usize,
    pub grouping: GroupingMode,
    pub combinations: Vec<CombinationSummary>,
    pub results_file: String,
}

/// Aggregate for one (LLM, style) column pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinationSummary {
    pub rank: usize,
    pub llm: String,
    pub style: String,
    /// Mean over every row; error cells count as 0.0
    pub avg_similarity: f64,
    pub scored: usize,
    pub errors: usize,
}

impl JsonSummary {
    /// Create from a finished table
    pub fn from_table(
        run_id: impl Into<String>,
        table: &EvalTable,
        grouping: GroupingMode,
        results_file: impl Into<String>,
    ) -> Self {
        let mut combinations: Vec<CombinationSummary> = table
            .keys()
            .iter()
            .map(|key| {
                let (mut scored, mut errors, mut total) = (0, 0, 0.0);
                for cell in table.column(key) {
                    if cell.is_error() {
                        errors += 1;
                    } else {
                        scored += 1;
                    }
                    total += cell.similarity();
                }
                let count = scored + errors;
                CombinationSummary {
                    rank: 0,
                    llm: key.llm.clone(),
                    style: key.style.clone(),
                    avg_similarity: if count == 0 { 0.0 } else { total / count as f64 },
                    scored,
                    errors,
                }
            })
            .collect();

        // Stable sort keeps column order among ties
        combinations.sort_by(|a, b| {
            b.avg_similarity
                .partial_cmp(&a.avg_similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for (i, c) in combinations.iter_mut().enumerate() {
            c.rank = i + 1;
        }

        Self {
            run_id: run_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            total_records: table.len(),
            grouping,
            combinations,
            results_file: results_file.into(),
        }
    }

    /// Write to JSON file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}

/// Generate a console report
pub fn print_console_report(summary: &JsonSummary) {
    println!("\n=== Document QA Evaluation Results ===\n");
    println!("Total Records: {} ({:?})\n", summary.total_records, summary.grouping);

    println!("Rankings:");
    println!("{:-<60}", "");

    for c in &summary.combinations {
        println!(
            "  {}. {} / {} - Avg Similarity: {:.4}, Scored: {}, Errors: {}",
            c.rank, c.llm, c.style, c.avg_similarity, c.scored, c.errors
        );
    }

    println!("\nResults written to {}", summary.results_file);
    println!("\n{:=<60}", "");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EvalPlan, InstructionStyle, LlmChoice, ProviderKind};
    use crate::records::Record;
    use crate::runner::{CellKey, EvalCell};

    #[test]
    fn test_summary_ranks_by_average() {
        let llm = |label: &str| LlmChoice {
            label: label.into(),
            model_id: "m".into(),
            provider: ProviderKind::OpenAI,
            temperature: 0.7,
        };
        let plan = EvalPlan::new(
            vec![llm("GPT_4"), llm("CLAUDE")],
            vec![InstructionStyle {
                name: "data".into(),
                system_message: String::new(),
            }],
        );
        let records = vec![
            Record::new(0, "", vec!["Q".into()], "http://a", vec!["A".into()]),
            Record::new(1, "", vec!["Q".into()], "http://b", vec!["A".into()]),
        ];
        let mut table = EvalTable::new(&plan, &records);
        let gpt = CellKey::new("GPT_4", "data");
        let claude = CellKey::new("CLAUDE", "data");
        table.set(&records[0], &gpt, EvalCell::scored(vec!["A".into()], 0.5));
        table.set(&records[1], &gpt, EvalCell::failed("boom"));
        table.set(&records[0], &claude, EvalCell::scored(vec!["A".into()], 1.0));
        table.set(&records[1], &claude, EvalCell::scored(vec!["A".into()], 0.8));

        let summary = JsonSummary::from_table("run", &table, GroupingMode::PerRow, "out.csv");
        assert_eq!(summary.total_records, 2);
        assert_eq!(summary.combinations[0].llm, "CLAUDE");
        assert_eq!(summary.combinations[0].rank, 1);
        assert!((summary.combinations[0].avg_similarity - 0.9).abs() < 1e-9);
        assert_eq!(summary.combinations[1].errors, 1);
        assert!((summary.combinations[1].avg_similarity - 0.25).abs() < 1e-9);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        summary.write_to_file(&path).unwrap();
        let parsed: JsonSummary =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.combinations.len(), 2);
    }
}
