//! Evaluation execution engine

pub mod executor;
pub mod progress;
pub mod results;

pub use executor::Evaluator;
pub use progress::{CheckpointProgress, ConsoleProgress, NoOpProgress, ProgressCallback};
pub use results::{CellKey, EvalCell, EvalTable, RecordResult};
