//! Error types for the summary index and dedup caches

use thiserror::Error;

use crate::termindex::IndexError;

pub type Result<T> = std::result::Result<T, SummaryError>;

#[derive(Error, Debug)]
pub enum SummaryError {
    /// Cached content disagrees with what is being stored, or the search
    /// index reported a failure.
    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Entry has no id: {0}")]
    MissingId(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SummaryError {
    /// Stable error code, for callers that log or map errors.
    pub fn code(&self) -> &'static str {
        match self {
            SummaryError::Consistency(_) => "CONSISTENCY",
            SummaryError::MissingId(_) => "MISSING_ID",
            SummaryError::NotFound(_) => "NOT_FOUND",
            SummaryError::Parse(_) => "PARSE",
            SummaryError::Io(_) => "IO",
            SummaryError::Json(_) => "JSON",
        }
    }
}

/// Term index failures surface as consistency errors of the summary.
impl From<IndexError> for SummaryError {
    fn from(err: IndexError) -> Self {
        SummaryError::Consistency(err.to_string())
    }
}
