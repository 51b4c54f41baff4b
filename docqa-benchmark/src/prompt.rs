//! Prompt assembly for numbered comprehension questions

use std::fmt::Write;

/// Build the user prompt for one document and its questions.
///
/// Document text is inserted verbatim; callers that care about context windows must
/// bound it before calling.
pub fn build_prompt<S: AsRef<str>>(term: Option<&str>, document_text: &str, questions: &[S]) -> String {
    let mut prompt = String::with_capacity(document_text.len() + 64 * (questions.len() + 1));

    if let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) {
        let _ = writeln!(prompt, "Term: {}", term);
    }
    let _ = writeln!(prompt, "Context: {}", document_text);
    prompt.push_str("\nQuestions:\n");
    for (i, question) in questions.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", i + 1, question.as_ref().trim());
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_prompt_layout() {
        let prompt = build_prompt(Some("Renewal"), "The term renews yearly.", &["  When?  ", "How long?"]);
        assert_eq!(
            prompt,
            "Term: Renewal\nContext: The term renews yearly.\n\nQuestions:\n1. When?\n2. How long?\n"
        );
    }

    #[test]
    fn test_prompt_without_term() {
        let prompt = build_prompt(None, "ctx", &["Q1"]);
        assert_eq!(prompt, "Context: ctx\n\nQuestions:\n1. Q1\n");
        assert_eq!(build_prompt(Some("  "), "ctx", &["Q1"]), prompt);
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let questions = vec!["a".to_string(), "b".to_string()];
        assert_eq!(build_prompt(Some("X"), "doc", &questions), build_prompt(Some("X"), "doc", &questions));
    }
}
