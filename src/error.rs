use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

use crate::store::StoreError;

/// Failures of attendance operations. Everything except `Store` and
/// `Export` is a precondition the caller can correct; none are retried.
#[derive(Debug, Display)]
pub enum AttendanceError {
    #[display(fmt = "Already checked in today")]
    AlreadyCheckedIn,

    /// The store's unique key rejected a concurrent check-in.
    #[display(fmt = "Concurrent check-in rejected by unique key")]
    Conflict,

    #[display(fmt = "You need to check in first")]
    NotCheckedIn,

    #[display(fmt = "Already checked out today")]
    AlreadyCheckedOut,

    #[display(fmt = "Check-out time cannot be before check-in time")]
    InvalidCheckOutTime,

    #[display(fmt = "Invalid month or year")]
    InvalidPeriod,

    #[display(fmt = "{}", _0)]
    Store(StoreError),

    #[display(fmt = "export failed: {}", _0)]
    Export(String),
}

impl std::error::Error for AttendanceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttendanceError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for AttendanceError {
    fn from(e: StoreError) -> Self {
        AttendanceError::Store(e)
    }
}

impl AttendanceError {
    /// Message shown to the caller. A lost check-in race reads the same as
    /// a plain second check-in.
    pub fn public_message(&self) -> String {
        match self {
            AttendanceError::Conflict => AttendanceError::AlreadyCheckedIn.to_string(),
            AttendanceError::Store(_) | AttendanceError::Export(_) => "Server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::Store(_) | AttendanceError::Export(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "attendance request failed");
        }

        HttpResponse::build(status).json(json!({
            "success": false,
            "message": self.public_message(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_failures_are_bad_requests() {
        for err in [
            AttendanceError::AlreadyCheckedIn,
            AttendanceError::Conflict,
            AttendanceError::NotCheckedIn,
            AttendanceError::AlreadyCheckedOut,
            AttendanceError::InvalidCheckOutTime,
            AttendanceError::InvalidPeriod,
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{err}");
        }
    }

    #[test]
    fn conflict_reads_as_already_checked_in() {
        assert_eq!(
            AttendanceError::Conflict.public_message(),
            "Already checked in today"
        );
    }

    #[test]
    fn store_failures_hide_details() {
        let err = AttendanceError::from(StoreError::DataCorruption("bad row".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Server error");
        assert!(err.to_string().contains("bad row"));
    }
}
