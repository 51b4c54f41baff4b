//! Input records and link grouping

pub mod loader;

pub use loader::{load_records_from_file, load_records_from_reader, LoadError, REQUIRED_COLUMNS};

use serde::{Deserialize, Serialize};

/// Maximum number of records batched into one LLM call in group mode
pub const MAX_GROUP_MEMBERS: usize = 5;

/// One input row: a question set tied to a source link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Position in the input table
    pub index: usize,
    pub term: String,
    pub questions: Vec<String>,
    pub link: String,
    pub answer_keys: Vec<String>,
}

impl Record {
    /// Create a record; callers guarantee `questions.len() == answer_keys.len()`
    pub fn new(
        index: usize,
        term: impl Into<String>,
        questions: Vec<String>,
        link: impl Into<String>,
        answer_keys: Vec<String>,
    ) -> Self {
        debug_assert_eq!(questions.len(), answer_keys.len());
        Self {
            index,
            term: term.into(),
            questions,
            link: link.into(),
            answer_keys,
        }
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }
}

/// How records are batched into LLM calls, chosen once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMode {
    /// One call per record
    PerRow,
    /// One call per group of records sharing a link
    ByLink,
}

impl GroupingMode {
    pub fn from_flag(group_by_link: bool) -> Self {
        if group_by_link {
            GroupingMode::ByLink
        } else {
            GroupingMode::PerRow
        }
    }
}

/// Records sharing one link, evaluated with a single combined prompt
#[derive(Debug, Clone, PartialEq)]
pub struct Group<'a> {
    pub link: &'a str,
    pub members: Vec<&'a Record>,
}

impl<'a> Group<'a> {
    /// Questions of every member, in member order
    pub fn flattened_questions(&self) -> Vec<&'a str> {
        self.members
            .iter()
            .flat_map(|r| r.questions.iter().map(String::as_str))
            .collect()
    }

    /// Answer keys of every member, in member order
    pub fn flattened_answer_keys(&self) -> Vec<&'a str> {
        self.members
            .iter()
            .flat_map(|r| r.answer_keys.iter().map(String::as_str))
            .collect()
    }

    /// Number of questions each member contributes
    pub fn question_counts(&self) -> Vec<usize> {
        self.members.iter().map(|r| r.question_count()).collect()
    }
}

/// Group records by link.
///
/// Links appear in order of first occurrence and members keep input order. A link
/// with more than `max_members` records yields several consecutive groups.
pub fn group_by_link(records: &[Record], max_members: usize) -> Vec<Group<'_>> {
    let max_members = max_members.max(1);
    let mut by_link: indexmap::IndexMap<&str, Vec<&Record>> = indexmap::IndexMap::new();
    for record in records {
        by_link.entry(record.link.as_str()).or_default().push(record);
    }

    by_link
        .into_iter()
        .flat_map(|(link, members)| {
            members
                .chunks(max_members)
                .map(|chunk| Group {
                    link,
                    members: chunk.to_vec(),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize, link: &str, questions: &[&str]) -> Record {
        let qs: Vec<String> = questions.iter().map(|q| q.to_string()).collect();
        let keys = qs.iter().map(|q| format!("key-{}", q)).collect();
        Record::new(index, format!("T{}", index), qs, link, keys)
    }

    #[test]
    fn test_grouping_preserves_first_seen_order() {
        let records = vec![
            record(0, "b", &["q0"]),
            record(1, "a", &["q1"]),
            record(2, "b", &["q2", "q3"]),
        ];
        let groups = group_by_link(&records, MAX_GROUP_MEMBERS);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].link, "b");
        assert_eq!(groups[0].members.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(groups[0].flattened_questions(), vec!["q0", "q2", "q3"]);
        assert_eq!(groups[0].flattened_answer_keys(), vec!["key-q0", "key-q2", "key-q3"]);
        assert_eq!(groups[0].question_counts(), vec![1, 2]);
        assert_eq!(groups[1].link, "a");
    }

    #[test]
    fn test_grouping_caps_members() {
        let records: Vec<Record> = (0..7).map(|i| record(i, "same", &["q"])).collect();
        let groups = group_by_link(&records, MAX_GROUP_MEMBERS);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members.len(), 5);
        assert_eq!(groups[1].members.len(), 2);
        assert_eq!(groups[1].members[0].index, 5);
    }

    #[test]
    fn test_grouping_mode_flag() {
        assert_eq!(GroupingMode::from_flag(true), GroupingMode::ByLink);
        assert_eq!(GroupingMode::from_flag(false), GroupingMode::PerRow);
    }
}
