use actix_web::{HttpResponse, http::StatusCode};
use chrono::{NaiveDateTime, SubsecRound};
use serde::Serialize;

pub mod attendance;
pub mod dashboard;

/// Body shape shared by every endpoint: `{success, message?, data?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }

    pub fn ok(data: T) -> HttpResponse {
        HttpResponse::Ok().json(Self::data(data))
    }
}

pub fn failure(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ApiResponse::<()> {
        success: false,
        message: Some(message.into()),
        data: None,
    })
}

/// Attendance timestamps are stored as `DATETIME(3)`.
const STORED_SUBSEC_DIGITS: u16 = 3;

/// Wall-clock time in the server's zone, at the precision it is stored
/// with. Attendance days and the office start time are both local.
pub fn local_now() -> NaiveDateTime {
    to_stored_precision(chrono::Local::now().naive_local())
}

/// Truncates, never rounds, so the day and status derived from the value
/// match what is read back.
pub fn to_stored_precision(time: NaiveDateTime) -> NaiveDateTime {
    time.trunc_subsecs(STORED_SUBSEC_DIGITS)
}
