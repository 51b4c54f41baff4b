//! Output table writer

use std::io::Write;
use std::path::Path;

use crate::records::loader::LIST_SEPARATOR;
use crate::records::REQUIRED_COLUMNS;
use crate::runner::EvalTable;

/// Write the table as CSV: the input columns, then a result/similarity pair per combination
pub fn write_table(path: impl AsRef<Path>, table: &EvalTable) -> Result<(), csv::Error> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_table_to(file, table)
}

/// Write the table to any sink
pub fn write_table_to<W: Write>(writer: W, table: &EvalTable) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header: Vec<String> = REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect();
    for key in table.keys() {
        header.push(key.result_column());
        header.push(key.similarity_column());
    }
    wtr.write_record(&header)?;

    let separator = LIST_SEPARATOR.to_string();
    for row in table.rows() {
        let record = &row.record;
        let mut fields = vec![
            record.term.clone(),
            record.questions.join(&separator),
            record.link.clone(),
            record.answer_keys.join(&separator),
        ];
        for key in table.keys() {
            match row.cell(key) {
                Some(cell) => {
                    fields.push(cell.result_text());
                    fields.push(format!("{:.4}", cell.similarity()));
                }
                None => {
                    fields.push(String::new());
                    fields.push(String::new());
                }
            }
        }
        wtr.write_record(&fields)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EvalPlan, InstructionStyle, LlmChoice, ProviderKind};
    use crate::records::Record;
    use crate::runner::{CellKey, EvalCell};

    fn table() -> (EvalTable, Vec<Record>) {
        let plan = EvalPlan::new(
            vec![LlmChoice {
                label: "TEST".into(),
                model_id: "m".into(),
                provider: ProviderKind::Ollama,
                temperature: 0.0,
            }],
            vec![InstructionStyle {
                name: "plain".into(),
                system_message: String::new(),
            }],
        );
        let records = vec![
            Record::new(0, "X", vec!["Q1".into(), "Q2".into()], "http://a", vec!["A1".into(), "A2".into()]),
            Record::new(1, "Y", vec!["Q3".into()], "http://b", vec!["A3".into()]),
        ];
        (EvalTable::new(&plan, &records), records)
    }

    #[test]
    fn test_written_columns_and_values() {
        let (mut table, records) = table();
        let key = CellKey::new("TEST", "plain");
        table.set(&records[0], &key, EvalCell::scored(vec!["A1".into(), "A2".into()], 1.0));
        table.set(&records[1], &key, EvalCell::failed("timeout, twice"));

        let mut out = Vec::new();
        write_table_to(&mut out, &table).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Term,Questions,Link,AnswerKey,Result_TEST_plain,Similarity_TEST_plain");
        assert_eq!(lines[1], "X,Q1|Q2,http://a,A1|A2,A1 | A2,1.0000");
        assert_eq!(lines[2], "Y,Q3,http://b,A3,\"Error: timeout, twice\",0.0000");
    }

    #[test]
    fn test_unwritten_cells_are_blank() {
        let (table, _) = table();
        let mut out = Vec::new();
        write_table_to(&mut out, &table).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().nth(2), Some("Y,Q3,http://b,A3,,"));
    }
}
