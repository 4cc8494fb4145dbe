use crate::{
    api::{ApiResponse, failure, local_now},
    auth::auth::AuthUser,
    error::AttendanceError,
    model::{
        attendance::{AttendanceRecord, AttendanceStatus},
        period::MonthPeriod,
        report::AttendanceSummary,
    },
    service::{AppAttendanceService, report::AttendanceQuery},
};
use actix_web::{HttpResponse, http::StatusCode, http::header, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PeriodQuery {
    /// 1-12
    #[schema(example = 3)]
    pub month: Option<u32>,
    #[schema(example = 2026)]
    pub year: Option<i32>,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AttendanceListQuery {
    /// Used only together with `end_date`
    #[schema(example = "2026-03-01")]
    pub start_date: Option<String>,
    #[schema(example = "2026-03-31")]
    pub end_date: Option<String>,
    /// present, late, absent, half-day
    #[schema(example = "late")]
    pub status: Option<String>,
    /// Employee code
    #[schema(example = "EMP004")]
    pub employee_id: Option<String>,
    #[schema(example = "Engineering")]
    pub department: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| format!("Invalid date {raw:?}, expected YYYY-MM-DD"))
}

impl AttendanceListQuery {
    pub fn parse(&self) -> Result<AttendanceQuery, String> {
        let start_date = non_empty(&self.start_date).map(parse_date).transpose()?;
        let end_date = non_empty(&self.end_date).map(parse_date).transpose()?;

        let status = non_empty(&self.status)
            .map(|raw| {
                raw.parse::<AttendanceStatus>()
                    .map_err(|_| format!("Invalid status {raw:?}"))
            })
            .transpose()?;

        Ok(AttendanceQuery {
            start_date,
            end_date,
            status,
            employee_code: non_empty(&self.employee_id).map(str::to_string),
            department: non_empty(&self.department).map(str::to_string),
        })
    }
}

/// Check in for today
#[utoipa::path(
    post,
    path = "/api/attendance/checkin",
    responses(
        (status = 200, description = "Checked in", body = AttendanceRecord),
        (status = 400, description = "Already checked in today", body = Object, example = json!({
            "success": false, "message": "Already checked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<HttpResponse> {
    let record = service.check_in(auth.user_id, local_now()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message("Checked in successfully", record)))
}

/// Check out for today
#[utoipa::path(
    post,
    path = "/api/attendance/checkout",
    responses(
        (status = 200, description = "Checked out", body = AttendanceRecord),
        (status = 400, description = "Not checked in, already checked out, or clock went backwards", body = Object, example = json!({
            "success": false, "message": "You need to check in first"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<HttpResponse> {
    let record = service.check_out(auth.user_id, local_now()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Checked out successfully",
        record,
    )))
}

/// Today's record of the caller
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's record, or a not-checked-in marker", body = Object, example = json!({
            "success": true, "data": { "status": "not-checked-in" }
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<HttpResponse> {
    let status = service.today_status(auth.user_id, local_now()).await?;
    Ok(ApiResponse::ok(status))
}

/// Caller's records, newest first
#[utoipa::path(
    get,
    path = "/api/attendance/my-history",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Attendance records", body = [AttendanceRecord]),
        (status = 400, description = "Invalid month or year"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn my_history(
    auth: AuthUser,
    query: web::Query<PeriodQuery>,
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<HttpResponse> {
    let period = MonthPeriod::both(query.month, query.year).ok_or(AttendanceError::InvalidPeriod)?;
    let records = service.history(auth.user_id, period).await?;
    Ok(ApiResponse::ok(records))
}

/// Caller's counts and hours for a month (defaults to the current one)
#[utoipa::path(
    get,
    path = "/api/attendance/my-summary",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Monthly summary", body = AttendanceSummary),
        (status = 400, description = "Invalid month or year"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn my_summary(
    auth: AuthUser,
    query: web::Query<PeriodQuery>,
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<HttpResponse> {
    let period = MonthPeriod::resolve(query.month, query.year, local_now())
        .ok_or(AttendanceError::InvalidPeriod)?;
    let summary = service.summary(auth.user_id, period).await?;
    Ok(ApiResponse::ok(summary))
}

/// Records of all employees, joined with their profile
#[utoipa::path(
    get,
    path = "/api/attendance/all",
    params(AttendanceListQuery),
    responses(
        (status = 200, description = "Records with employee info, newest first", body = Object),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Manager role required")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn all_attendance(
    auth: AuthUser,
    query: web::Query<AttendanceListQuery>,
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;

    let query = match query.parse() {
        Ok(q) => q,
        Err(msg) => return Ok(failure(StatusCode::BAD_REQUEST, msg)),
    };
    let rows = service.all_attendance(&query).await?;
    Ok(ApiResponse::ok(rows))
}

/// One employee's records
#[utoipa::path(
    get,
    path = "/api/attendance/employee/{id}",
    params(
        ("id" = u64, Path, description = "User id"),
        PeriodQuery
    ),
    responses(
        (status = 200, description = "Records with employee info", body = Object),
        (status = 400, description = "Invalid month or year"),
        (status = 403, description = "Manager role required")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn employee_attendance(
    auth: AuthUser,
    path: web::Path<u64>,
    query: web::Query<PeriodQuery>,
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;

    let period = MonthPeriod::both(query.month, query.year).ok_or(AttendanceError::InvalidPeriod)?;
    let rows = service
        .employee_attendance(path.into_inner(), period)
        .await?;
    Ok(ApiResponse::ok(rows))
}

/// Team counts and hours for a month (defaults to the current one)
#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Team summary", body = Object, example = json!({
            "success": true,
            "data": {
                "total_employees": 12, "present": 180, "absent": 0, "late": 21,
                "half_day": 4, "total_hours": 1650.5, "total_days": 205
            }
        })),
        (status = 400, description = "Invalid month or year"),
        (status = 403, description = "Manager role required")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn team_summary(
    auth: AuthUser,
    query: web::Query<PeriodQuery>,
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;

    let period = MonthPeriod::resolve(query.month, query.year, local_now())
        .ok_or(AttendanceError::InvalidPeriod)?;
    let summary = service.team_summary(period).await?;
    Ok(ApiResponse::ok(summary))
}

/// Download records as CSV
#[utoipa::path(
    get,
    path = "/api/attendance/export",
    params(AttendanceListQuery),
    responses(
        (status = 200, description = "CSV report", content_type = "text/csv", body = String),
        (status = 400, description = "Invalid filter"),
        (status = 403, description = "Manager role required")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn export(
    auth: AuthUser,
    query: web::Query<AttendanceListQuery>,
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;

    let query = match query.parse() {
        Ok(q) => q,
        Err(msg) => return Ok(failure(StatusCode::BAD_REQUEST, msg)),
    };
    let csv = service.export_csv(&query).await?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((
            header::CONTENT_DISPOSITION,
            "attachment; filename=attendance_report.csv",
        ))
        .body(csv))
}

/// Today's roster: present, late, half-day, absent
#[utoipa::path(
    get,
    path = "/api/attendance/today-status",
    responses(
        (status = 200, description = "Roster partitions for today", body = Object),
        (status = 403, description = "Manager role required")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today_status(
    auth: AuthUser,
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;

    let roster = service.team_roster(local_now().date()).await?;
    Ok(ApiResponse::ok(roster))
}

/// Remove a day's record so the employee reads as absent
#[utoipa::path(
    delete,
    path = "/api/attendance/employee/{id}/{date}",
    params(
        ("id" = u64, Path, description = "User id"),
        ("date" = String, Path, description = "Day, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Whether a record was removed", body = Object, example = json!({
            "success": true, "data": { "removed": true }
        })),
        (status = 400, description = "Invalid date"),
        (status = 403, description = "Manager role required")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn mark_absent(
    auth: AuthUser,
    path: web::Path<(u64, String)>,
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;

    let (user_id, raw_date) = path.into_inner();
    let date = match parse_date(&raw_date) {
        Ok(d) => d,
        Err(msg) => return Ok(failure(StatusCode::BAD_REQUEST, msg)),
    };

    tracing::info!(manager_id = auth.user_id, user_id, %date, "Mark-absent requested");
    let removed = service.mark_absent(user_id, date).await?;
    Ok(ApiResponse::ok(json!({ "removed": removed })))
}
