//! Mapping a free-text LLM reply back onto individual questions
//!
//! The reply is assumed to hold one answer per line, in question order. Nothing checks
//! that assumption; a reply with preamble lines shifts every answer.

/// Strategy for splitting a reply into ordered answers
pub trait AnswerAligner: Send + Sync {
    /// Return at most `expected` answers, in order
    fn align(&self, response: &str, expected: usize) -> Vec<String>;
}

/// One answer per non-blank line
#[derive(Debug, Clone, Copy, Default)]
pub struct LineAligner;

impl AnswerAligner for LineAligner {
    fn align(&self, response: &str, expected: usize) -> Vec<String> {
        align_lines(response, expected)
    }
}

/// Split on line breaks, trim, drop blank lines, keep the first `expected`
pub fn align_lines(response: &str, expected: usize) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(expected)
        .map(String::from)
        .collect()
}

/// Hand out consecutive slices of `answers`, `counts[i]` answers to member `i`.
///
/// Members past the end of `answers` receive short or empty slices.
pub fn partition<'a>(answers: &'a [String], counts: &[usize]) -> Vec<&'a [String]> {
    let mut start = 0;
    counts
        .iter()
        .map(|&count| {
            let begin = start.min(answers.len());
            let end = (start + count).min(answers.len());
            start += count;
            &answers[begin..end]
        })
        .collect()
}
