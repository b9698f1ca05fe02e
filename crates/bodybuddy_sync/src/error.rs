//! Error types for the sync engine.

use bodybuddy_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync.
///
/// None of them are retried automatically. A sync stops at the first error
/// and pages merged before it stay committed.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A page URL could not be built or parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The HTTP request failed before a response arrived.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with an error status or an unusable envelope.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The response carried no body.
    #[error("missing data")]
    MissingData,

    /// The response body is not a JSON object.
    #[error("parsing error: {0}")]
    Parsing(String),

    /// Merged rows could not be committed.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl SyncError {
    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Creates a request error.
    pub fn request(message: impl std::fmt::Display) -> Self {
        Self::Request(message.to_string())
    }

    /// Returns true if the error came from the local store rather than the
    /// remote side.
    pub fn is_local(&self) -> bool {
        matches!(self, SyncError::Persistence(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            SyncError::invalid_response("not found").to_string(),
            "invalid response: not found"
        );
        assert_eq!(SyncError::MissingData.to_string(), "missing data");
    }

    #[test]
    fn store_errors_convert() {
        let err: SyncError = StoreError::commit_failed("disk full").into();
        assert!(err.is_local());
        assert!(err.to_string().contains("disk full"));
        assert!(!SyncError::request("connection reset").is_local());
    }
}
