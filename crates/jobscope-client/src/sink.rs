use std::fs::File;
use std::path::Path;

use jobscope_core::error::AppError;
use jobscope_core::traits::RowSink;

/// Appends rows to a CSV file, flushing after every row so that an
/// interrupted run keeps everything written so far.
pub struct CsvSink {
    writer: csv::Writer<File>,
}

impl CsvSink {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let writer = csv::Writer::from_path(path).map_err(|e| {
            AppError::PersistError(format!("cannot open {}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "Opened CSV output");
        Ok(Self { writer })
    }
}

impl RowSink for CsvSink {
    fn append(&mut self, cells: &[String]) -> Result<(), AppError> {
        self.writer
            .write_record(cells)
            .map_err(|e| AppError::PersistError(e.to_string()))?;
        self.writer
            .flush()
            .map_err(|e| AppError::PersistError(e.to_string()))
    }
}
