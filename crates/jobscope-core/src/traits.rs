use std::future::Future;

use crate::error::AppError;

/// Fetches raw HTML content from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Tabular output: appends one row of string cells and persists it.
///
/// Implementations must make the row durable before returning, so that a
/// crash after N successful calls leaves N rows on disk.
pub trait RowSink {
    fn append(&mut self, cells: &[String]) -> Result<(), AppError>;
}
