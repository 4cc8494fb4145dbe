use crate::api::attendance::{AttendanceListQuery, PeriodQuery};
use crate::auth::handlers::{RegisterResponse, TokenResponse};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::report::AttendanceSummary;
use crate::model::user::Employee;
use crate::models::{LoginReqDto, RegisterReq};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance API",
        version = "1.0.0",
        description = r#"
## Employee Attendance Tracker

Daily check-in/check-out with derived status and worked hours.

### Rules
- One record per employee per day; a second check-in is rejected
- A check-in after the office start time (default **09:00**) is **late**
- A day of more than 4 and less than 5 worked hours becomes **half-day**
- An employee with no record for a day is **absent**

### Roles
- **Employee**: own check-in/check-out, history, monthly summary, dashboard
- **Manager / Admin**: team roster, listings, CSV export, approvals

### Response Format
`{ "success": bool, "message"?: string, "data"?: ... }`

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,
        crate::auth::handlers::pending_approvals,
        crate::auth::handlers::approve_user,
        crate::auth::handlers::reject_user,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,
        crate::api::attendance::my_history,
        crate::api::attendance::my_summary,
        crate::api::attendance::all_attendance,
        crate::api::attendance::employee_attendance,
        crate::api::attendance::team_summary,
        crate::api::attendance::export,
        crate::api::attendance::today_status,
        crate::api::attendance::mark_absent,

        crate::api::dashboard::employee_dashboard,
        crate::api::dashboard::manager_dashboard
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            TokenResponse,
            RegisterResponse,
            Employee,
            AttendanceRecord,
            AttendanceStatus,
            AttendanceSummary,
            PeriodQuery,
            AttendanceListQuery
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login, and approvals"),
        (name = "Attendance", description = "Check-in/check-out and attendance reports"),
        (name = "Dashboard", description = "Aggregated views for employees and managers"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
