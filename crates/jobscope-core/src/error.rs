use thiserror::Error;

/// Application-wide error types for Jobscope.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (non-success status or unreadable body).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request did not complete within the per-fetch deadline.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Discovery found no entity names on the directory page.
    #[error("No results: {0}")]
    EmptyResult(String),

    /// The output destination could not be written.
    #[error("Persist error: {0}")]
    PersistError(String),

    /// A CSS selector in a field spec failed to parse.
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Invalid pipeline or extractor configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AppError {
    /// Returns true if this error means a page could not be retrieved.
    ///
    /// Fetch failures are isolated to the stage that hit them: the stage is
    /// skipped and whatever the other stage merged is kept.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            AppError::HttpError(_) | AppError::NetworkError(_) | AppError::Timeout(_)
        )
    }
}
