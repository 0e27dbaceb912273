//! Typed errors for the KYC extraction library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can branch
//! on recoverability: a failed model call may be retried with the same image,
//! while an unusable response usually means re-prompting or re-capturing.

use thiserror::Error;

/// Errors that can occur while extracting or normalizing document fields.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The vision model call did not complete (transport, service, timeout)
    #[error("extraction failed: {0}")]
    ExtractionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The model output contains no `{...}` span at all
    #[error("no structured data found in model output")]
    NoStructuredDataFound,

    /// A `{...}` span was found but is not a valid JSON object
    #[error("malformed structured data: {0}")]
    MalformedStructuredData(#[source] MalformedData),

    /// The request was rejected before reaching the model
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Why a located JSON span could not be used.
#[derive(Debug, Error)]
pub enum MalformedData {
    /// The parser rejected the span
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// The span parsed, but not to an object
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },
}

impl ExtractionError {
    /// Wrap any error as a failed model call.
    pub fn extraction_failed<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ExtractionFailed(Box::new(source))
    }

    /// Build an [`ExtractionError::InvalidRequest`].
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Whether repeating the same call could plausibly succeed.
    ///
    /// Only model-call failures qualify; parse failures are deterministic
    /// for a given output.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExtractionFailed(_))
    }
}

impl From<serde_json::Error> for ExtractionError {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedStructuredData(MalformedData::Json(e))
    }
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;
