use thiserror::Error;

use crate::LookupError;

/// Errors that can occur while waiting for admission
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    /// The sweep was cancelled while waiting at one of the gates
    #[error("Cancelled while waiting for admission")]
    Cancelled,

    /// The concurrency gate was closed
    #[error("Concurrency gate was closed")]
    Closed,
}

impl From<AdmissionError> for LookupError {
    fn from(e: AdmissionError) -> Self {
        match e {
            AdmissionError::Cancelled => LookupError::Cancelled,
            AdmissionError::Closed => LookupError::Permanent(e.to_string()),
        }
    }
}
