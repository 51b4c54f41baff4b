//! Response analysis: answer alignment and similarity scoring

pub mod align;
pub mod similarity;

pub use align::{align_lines, partition, AnswerAligner, LineAligner};
pub use similarity::{answer_similarity, score, similarity_ratio};
