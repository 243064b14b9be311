use std::sync::Arc;

use thiserror::Error;

/// Shared cause of a failed allocation. Kept behind an `Arc` so repeated
/// `get` calls on the same wait hand out equivalent errors.
pub type AllocationCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(Arc<std::io::Error>),

    #[error("Failed to parse configuration JSON: {0}")]
    DeserializationError(Arc<serde_json::Error>),

    #[error("Malformed node/reservation text: {0}")]
    ParseError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Reservation failed: {reason}")]
    ReservationFailed {
        reason: String,
        #[source]
        cause: Option<AllocationCause>,
    },
}

impl Error {
    pub fn reservation_failed(reason: impl Into<String>, cause: Option<AllocationCause>) -> Self {
        Error::ReservationFailed { reason: reason.into(), cause }
    }

    pub fn is_reservation_failed(&self) -> bool {
        matches!(self, Error::ReservationFailed { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(Arc::new(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::DeserializationError(Arc::new(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
