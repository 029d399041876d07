use serde::{Serialize, Serializer};
use std::time::Duration;
use thiserror::Error;

use crate::retry::RetryExt;

/// Possible errors when setting up or enumerating a sweep.
///
/// Lookup failures of single items never show up here; they are captured as
/// [`LookupError`] and reported per item instead.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Network error while fetching a page of items
    #[error("Network error while fetching a page of items")]
    NetworkRequest(#[source] reqwest::Error),

    /// The directory answered a page request with an unexpected status code
    #[error("Directory rejected the page request with status code {0}")]
    RejectedStatusCode(http::StatusCode),

    /// The page could not be decoded
    #[error("Cannot decode page of items: {0}")]
    InvalidPage(String),

    /// The endpoint is not a valid base URL
    #[error("Invalid directory endpoint `{0}`: {1}")]
    InvalidEndpoint(String, #[source] url::ParseError),

    /// The given header could not be parsed
    #[error("Header could not be parsed")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    BuildClient(#[source] reqwest::Error),

    /// Burst capacity, interval or concurrency was configured as zero
    #[error("Invalid admission configuration: {0}")]
    InvalidAdmission(&'static str),

    /// `filter` operation without a tag key or value
    #[error("Missing filter tag or value; both are required for the `filter` operation")]
    MissingFilter,

    /// A background task of the sweep could not be joined
    #[error("Sweep task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// Why the lookup of a single item failed.
///
/// The distinction between transient and permanent causes decides whether
/// the retry pass picks the item up again.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum LookupError {
    /// A failure which might go away on its own (throttling, 5xx, resets)
    #[error("{0}")]
    Transient(String),

    /// A failure which will not change when retried (404, invalid payload)
    #[error("{0}")]
    Permanent(String),

    /// The lookup did not complete within the configured timeout
    #[error("Lookup timed out after {}", humantime_serde::re::humantime::format_duration(*.0))]
    Timeout(Duration),

    /// The sweep was cancelled before the lookup could finish
    #[error("Sweep was cancelled before the lookup completed")]
    Cancelled,

    /// The task performing the lookup panicked
    #[error("Lookup task panicked: {0}")]
    Panicked(String),
}

impl LookupError {
    /// Create a transient lookup error from any displayable cause
    pub fn transient<E: std::fmt::Display>(cause: E) -> Self {
        Self::Transient(cause.to_string())
    }

    /// Create a permanent lookup error from any displayable cause
    pub fn permanent<E: std::fmt::Display>(cause: E) -> Self {
        Self::Permanent(cause.to_string())
    }

    /// Returns `true` if the retry pass should try this item again
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.should_retry()
    }

    /// Short label for the kind of failure, used in reports
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Transient(_) => "TRANSIENT",
            Self::Permanent(_) => "PERMANENT",
            Self::Timeout(_) => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::Panicked(_) => "PANICKED",
        }
    }
}

impl Serialize for LookupError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_error_display() {
        assert_eq!(
            LookupError::transient("throttled").to_string(),
            "throttled"
        );
        assert_eq!(
            LookupError::Timeout(Duration::from_millis(1500)).to_string(),
            "Lookup timed out after 1s 500ms"
        );
        assert_eq!(LookupError::Cancelled.label(), "CANCELLED");
    }

    #[test]
    fn test_lookup_error_serializes_as_string() {
        let json = serde_json::to_string(&LookupError::permanent("no such user")).unwrap();
        assert_eq!(json, "\"no such user\"");
    }
}
