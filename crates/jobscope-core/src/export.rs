use crate::error::AppError;
use crate::models::{Breakout, Extracted, FieldId, PartialRecord};
use crate::traits::RowSink;

/// Column headings, in row order.
pub const HEADER: [&str; 7] = [
    "name",
    "average salary",
    "salary by experience",
    "salary by city",
    "education demand",
    "experience demand",
    "regional demand",
];

/// Encode a breakout as a JSON object.
pub fn encode_breakout(map: &Breakout) -> Result<String, AppError> {
    Ok(serde_json::to_string(map)?)
}

/// Parse a cell written by [`encode_breakout`].
pub fn decode_breakout(cell: &str) -> Result<Breakout, AppError> {
    Ok(serde_json::from_str(cell)?)
}

/// Render a record as one row of cells.
///
/// Never-attempted and absent fields render the same way: an empty string
/// for the scalar and `{}` for mappings.
pub fn to_row(record: &PartialRecord) -> Result<Vec<String>, AppError> {
    let mut row = Vec::with_capacity(HEADER.len());
    row.push(record.name.clone());
    row.push(
        record
            .avg_salary
            .as_ref()
            .and_then(Extracted::present)
            .cloned()
            .unwrap_or_default(),
    );

    let empty = Breakout::new();
    for field in FieldId::ALL.into_iter().skip(1) {
        let map = record
            .breakout(field)
            .and_then(Option::as_ref)
            .and_then(Extracted::present)
            .unwrap_or(&empty);
        row.push(encode_breakout(map)?);
    }
    Ok(row)
}

/// Writes records to a [`RowSink`], one persisted row per record.
pub struct Exporter<S: RowSink> {
    sink: S,
    rows_written: usize,
}

impl<S: RowSink> Exporter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            rows_written: 0,
        }
    }

    pub fn write_header(&mut self) -> Result<(), AppError> {
        let header: Vec<String> = HEADER.iter().map(|h| h.to_string()).collect();
        self.sink.append(&header)
    }

    /// Serialize `record` and append it. Returns the written cells.
    pub fn export(&mut self, record: &PartialRecord) -> Result<Vec<String>, AppError> {
        let row = to_row(record)?;
        self.sink.append(&row)?;
        self.rows_written += 1;
        Ok(row)
    }

    /// Data rows written so far (the header excluded).
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }
}
