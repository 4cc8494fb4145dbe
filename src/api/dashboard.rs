use crate::{
    api::{ApiResponse, local_now},
    auth::auth::AuthUser,
    service::AppAttendanceService,
};
use actix_web::{HttpResponse, web};

/// Caller's today/month/last-7-days view
#[utoipa::path(
    get,
    path = "/api/dashboard/employee",
    responses(
        (status = 200, description = "Employee dashboard", body = Object, example = json!({
            "success": true,
            "data": {
                "today": {
                    "status": "checked-in",
                    "check_in_time": "2026-03-09T08:55:00",
                    "check_out_time": null,
                    "total_hours": 0.0
                },
                "monthly": {
                    "present": 5, "absent": 0, "late": 1, "half_day": 0,
                    "total_hours": 48.5, "total_days": 6
                },
                "recent": []
            }
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Dashboard"
)]
pub async fn employee_dashboard(
    auth: AuthUser,
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<HttpResponse> {
    let stats = service.employee_stats(auth.user_id, local_now()).await?;
    Ok(ApiResponse::ok(stats))
}

/// Team view: today's roster, 7-day trend, per-department totals
#[utoipa::path(
    get,
    path = "/api/dashboard/manager",
    responses(
        (status = 200, description = "Manager dashboard", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Manager role required")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Dashboard"
)]
pub async fn manager_dashboard(
    auth: AuthUser,
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;

    let stats = service.manager_stats(local_now()).await?;
    tracing::debug!(
        total_employees = stats.total_employees,
        absent = stats.today_stats.absent,
        "Built manager dashboard"
    );
    Ok(ApiResponse::ok(stats))
}
