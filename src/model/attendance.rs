use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Daily attendance status. `Absent` is never written by check-in/check-out;
/// a missing record is what makes an employee absent for a day.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    HalfDay,
}

/// Time of day the office opens, `HH:MM`. Check-ins strictly after it are late.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfficeStartTime(NaiveTime);

impl OfficeStartTime {
    pub fn new(time: NaiveTime) -> Self {
        Self(time)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl Default for OfficeStartTime {
    fn default() -> Self {
        Self(NaiveTime::MIN + Duration::hours(9))
    }
}

impl FromStr for OfficeStartTime {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M").map(Self)
    }
}

impl fmt::Display for OfficeStartTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

/// One record per (user, calendar day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "user_id": 7,
    "date": "2026-01-05",
    "check_in_time": "2026-01-05T08:45:00",
    "check_out_time": "2026-01-05T17:30:00",
    "status": "present",
    "total_hours": 8.75,
    "created_at": "2026-01-05T08:45:00"
}))]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in_time: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out_time: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
    pub total_hours: f64,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

impl AttendanceRecord {
    /// An unsaved record for the day of `now`, without a check-in yet.
    pub fn for_day(user_id: u64, now: NaiveDateTime) -> Self {
        Self {
            id: 0,
            user_id,
            date: now.date(),
            check_in_time: None,
            check_out_time: None,
            status: AttendanceStatus::Absent,
            total_hours: 0.0,
            created_at: now,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }

    /// Re-derives `status` from the record's own fields.
    ///
    /// The check-in decides present/late; once checked out, the half-day
    /// window on worked hours overrides that.
    pub fn recompute_status(&mut self, office_start: OfficeStartTime) {
        self.status = match self.check_in_time {
            None => AttendanceStatus::Absent,
            Some(check_in) => {
                let base = determine_status(check_in, office_start);
                if self.check_out_time.is_some() {
                    check_half_day(self.total_hours, base)
                } else {
                    base
                }
            }
        };
    }
}

/// `Late` iff the check-in is strictly after office start on the same day.
pub fn determine_status(
    check_in_time: NaiveDateTime,
    office_start: OfficeStartTime,
) -> AttendanceStatus {
    let office_start_at = check_in_time.date().and_time(office_start.time());

    if check_in_time > office_start_at {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

/// Worked hours rounded to two decimals.
pub fn calculate_total_hours(check_in_time: NaiveDateTime, check_out_time: NaiveDateTime) -> f64 {
    let millis = (check_out_time - check_in_time).num_milliseconds().max(0);
    round_hours(millis as f64 / 3_600_000.0)
}

pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

/// Half-day applies on the open interval (4, 5): exactly 4.00 or 5.00 keeps `status`.
pub fn check_half_day(total_hours: f64, status: AttendanceStatus) -> AttendanceStatus {
    if total_hours > 4.0 && total_hours < 5.0 {
        AttendanceStatus::HalfDay
    } else {
        status
    }
}

pub fn is_valid_check_out_time(
    check_in_time: Option<NaiveDateTime>,
    check_out_time: NaiveDateTime,
) -> bool {
    match check_in_time {
        Some(check_in) => check_out_time >= check_in,
        None => false,
    }
}
