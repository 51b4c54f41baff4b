//! Progress reporting and incremental checkpoints

use std::path::PathBuf;
use std::sync::Arc;

use super::results::{CellKey, EvalCell, EvalTable};
use crate::records::Record;
use crate::reporting::write_table;

/// Progress callback for tracking a run.
///
/// A unit is one record in row mode or one link group in group mode.
pub trait ProgressCallback: Send + Sync {
    fn on_unit_start(&self, link: &str, records: usize);
    fn on_cell_complete(&self, record: &Record, key: &CellKey, cell: &EvalCell);
    fn on_unit_complete(&self, table: &EvalTable, completed: usize, total: usize);
}

/// Default no-op progress callback
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_unit_start(&self, _link: &str, _records: usize) {}
    fn on_cell_complete(&self, _record: &Record, _key: &CellKey, _cell: &EvalCell) {}
    fn on_unit_complete(&self, _table: &EvalTable, _completed: usize, _total: usize) {}
}

/// Console progress callback
pub struct ConsoleProgress;

impl ProgressCallback for ConsoleProgress {
    fn on_unit_start(&self, link: &str, records: usize) {
        println!("  Evaluating {} ({} record(s))...", link, records);
    }

    fn on_cell_complete(&self, record: &Record, key: &CellKey, cell: &EvalCell) {
        match cell {
            EvalCell::Scored { similarity, .. } => {
                println!("    OK     row {} {}: {:.4}", record.index, key, similarity)
            }
            EvalCell::Failed { message } => {
                println!("    FAILED row {} {}: {}", record.index, key, message)
            }
        }
    }

    fn on_unit_complete(&self, _table: &EvalTable, completed: usize, total: usize) {
        println!("Progress: {}/{} complete", completed, total);
    }
}

/// Rewrites the output table after every unit, then forwards to an inner callback
pub struct CheckpointProgress {
    path: PathBuf,
    inner: Arc<dyn ProgressCallback>,
}

impl CheckpointProgress {
    pub fn new(path: impl Into<PathBuf>, inner: Arc<dyn ProgressCallback>) -> Self {
        Self {
            path: path.into(),
            inner,
        }
    }
}

impl ProgressCallback for CheckpointProgress {
    fn on_unit_start(&self, link: &str, records: usize) {
        self.inner.on_unit_start(link, records);
    }

    fn on_cell_complete(&self, record: &Record, key: &CellKey, cell: &EvalCell) {
        self.inner.on_cell_complete(record, key, cell);
    }

    fn on_unit_complete(&self, table: &EvalTable, completed: usize, total: usize) {
        match write_table(&self.path, table) {
            Ok(()) => tracing::debug!("Checkpoint written to {}", self.path.display()),
            Err(e) => tracing::warn!("Checkpoint to {} failed: {}", self.path.display(), e),
        }
        self.inner.on_unit_complete(table, completed, total);
    }
}
