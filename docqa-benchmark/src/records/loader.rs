//! Record loading from CSV tables

use std::io::Read;
use std::path::Path;

use super::Record;

/// Columns every input table must carry
pub const REQUIRED_COLUMNS: [&str; 4] = ["Term", "Questions", "Link", "AnswerKey"];

/// Separator inside `Questions` and `AnswerKey` cells
pub const LIST_SEPARATOR: char = '|';

/// Error type for record loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Input file must contain columns: {} (missing: {})", REQUIRED_COLUMNS.join(", "), .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Row {row}: {questions} question(s) but {answers} answer key(s)")]
    SegmentMismatch {
        row: usize,
        questions: usize,
        answers: usize,
    },
}

/// Load records from a CSV file
pub fn load_records_from_file(path: impl AsRef<Path>) -> Result<Vec<Record>, LoadError> {
    let file = std::fs::File::open(path)?;
    load_records_from_reader(file)
}

/// Load records from any CSV source with a header row
pub fn load_records_from_reader<R: Read>(reader: R) -> Result<Vec<Record>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h.trim() == name);

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| position(**c).is_none())
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::MissingColumns(missing));
    }

    // All present, checked above
    let [term_col, questions_col, link_col, answers_col] =
        REQUIRED_COLUMNS.map(|c| position(c).unwrap_or_default());

    let mut records = Vec::new();
    for (index, row) in rdr.records().enumerate() {
        let row = row?;
        let cell = |col: usize| row.get(col).unwrap_or("").to_string();

        let questions = split_list(&cell(questions_col));
        let answer_keys = split_list(&cell(answers_col));
        if questions.len() != answer_keys.len() {
            return Err(LoadError::SegmentMismatch {
                row: index,
                questions: questions.len(),
                answers: answer_keys.len(),
            });
        }

        records.push(Record::new(
            index,
            cell(term_col).trim(),
            questions,
            cell(link_col).trim(),
            answer_keys,
        ));
    }

    tracing::debug!("Loaded {} records", records.len());
    Ok(records)
}

/// Split a `|`-delimited cell into trimmed segments
pub fn split_list(cell: &str) -> Vec<String> {
    cell.split(LIST_SEPARATOR).map(|s| s.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_basic_table() {
        let csv = "Term,Questions,Link,AnswerKey\n\
                   X,Q1|Q2,http://example.com/doc.html,A1|A2\n\
                   Y,\"What is it? | Why?\",http://example.com/b.pdf,\"It is. | Because.\"\n";
        let records = load_records_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].term, "X");
        assert_eq!(records[0].questions, vec!["Q1", "Q2"]);
        assert_eq!(records[0].answer_keys, vec!["A1", "A2"]);
        assert_eq!(records[1].index, 1);
        assert_eq!(records[1].questions, vec!["What is it?", "Why?"]);
        assert_eq!(records[1].link, "http://example.com/b.pdf");
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let csv = "Link,AnswerKey,Extra,Questions,Term\nhttp://a,K,ignored,Q,T\n";
        let records = load_records_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(records[0].link, "http://a");
        assert_eq!(records[0].term, "T");
    }

    #[test]
    fn test_missing_columns_rejected() {
        let csv = "Term,Questions\nX,Q1\n";
        match load_records_from_reader(csv.as_bytes()) {
            Err(LoadError::MissingColumns(cols)) => assert_eq!(cols, vec!["Link", "AnswerKey"]),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_segment_mismatch_rejected() {
        let csv = "Term,Questions,Link,AnswerKey\nX,Q1|Q2|Q3,http://a,A1|A2\n";
        match load_records_from_reader(csv.as_bytes()) {
            Err(LoadError::SegmentMismatch { row, questions, answers }) => {
                assert_eq!((row, questions, answers), (0, 3, 2));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.csv");
        std::fs::write(&path, "Term,Questions,Link,AnswerKey\nX,Q,http://a,A\n").unwrap();
        assert_eq!(load_records_from_file(&path).unwrap().len(), 1);
    }
}
