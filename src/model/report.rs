use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use utoipa::ToSchema;

use crate::model::attendance::{AttendanceRecord, AttendanceStatus, round_hours};
use crate::model::user::Employee;

/// Status counts and worked hours over a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct AttendanceSummary {
    pub present: usize,
    /// Only counts stored rows, so check-in/check-out alone never raises it.
    pub absent: usize,
    pub late: usize,
    pub half_day: usize,
    pub total_hours: f64,
    pub total_days: usize,
}

impl AttendanceSummary {
    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        let mut summary = Self::default();

        for record in records {
            match record.status {
                AttendanceStatus::Present => summary.present += 1,
                AttendanceStatus::Absent => summary.absent += 1,
                AttendanceStatus::Late => summary.late += 1,
                AttendanceStatus::HalfDay => summary.half_day += 1,
            }
            summary.total_hours += record.total_hours;
        }

        summary.total_hours = round_hours(summary.total_hours);
        summary.total_days = records.len();
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSummary {
    pub total_employees: usize,
    #[serde(flatten)]
    pub counts: AttendanceSummary,
}

/// Today's record for one user, or the `not-checked-in` sentinel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TodayStatus {
    Recorded(AttendanceRecord),
    NotCheckedIn { status: &'static str },
}

impl TodayStatus {
    pub const NOT_CHECKED_IN: &'static str = "not-checked-in";

    pub fn from_record(record: Option<AttendanceRecord>) -> Self {
        match record {
            Some(record) => TodayStatus::Recorded(record),
            None => TodayStatus::NotCheckedIn {
                status: Self::NOT_CHECKED_IN,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceWithEmployee {
    #[serde(flatten)]
    pub record: AttendanceRecord,
    pub employee: Employee,
}

/// A day's attendance split by status. Absence is computed from the
/// employee set: an employee is absent when they have no record, or only a
/// stored `absent` row. `total_present` always equals
/// `present + late + half_day`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRoster {
    pub date: NaiveDate,
    pub present: Vec<AttendanceWithEmployee>,
    pub late: Vec<AttendanceWithEmployee>,
    pub half_day: Vec<AttendanceWithEmployee>,
    pub absent: Vec<Employee>,
    pub total_present: usize,
    pub total_absent: usize,
}

impl TeamRoster {
    /// Records of users outside `employees` are ignored.
    pub fn build(date: NaiveDate, employees: &[Employee], records: Vec<AttendanceRecord>) -> Self {
        let by_id: HashMap<u64, &Employee> = employees.iter().map(|e| (e.id, e)).collect();
        let mut present = Vec::new();
        let mut late = Vec::new();
        let mut half_day = Vec::new();
        let mut attended = HashSet::new();

        for record in records {
            let Some(employee) = by_id.get(&record.user_id) else {
                continue;
            };

            let partition = match record.status {
                AttendanceStatus::Present => &mut present,
                AttendanceStatus::Late => &mut late,
                AttendanceStatus::HalfDay => &mut half_day,
                AttendanceStatus::Absent => continue,
            };
            attended.insert(record.user_id);
            partition.push(AttendanceWithEmployee {
                employee: (*employee).clone(),
                record,
            });
        }

        let absent: Vec<Employee> = employees
            .iter()
            .filter(|e| !attended.contains(&e.id))
            .cloned()
            .collect();

        TeamRoster {
            date,
            total_present: present.len() + late.len() + half_day.len(),
            total_absent: absent.len(),
            present,
            late,
            half_day,
            absent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DayState {
    NotCheckedIn,
    CheckedIn,
    CheckedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodaySnapshot {
    pub status: DayState,
    pub check_in_time: Option<NaiveDateTime>,
    pub check_out_time: Option<NaiveDateTime>,
    pub total_hours: f64,
}

impl TodaySnapshot {
    pub fn from_record(record: Option<&AttendanceRecord>) -> Self {
        match record {
            None => TodaySnapshot {
                status: DayState::NotCheckedIn,
                check_in_time: None,
                check_out_time: None,
                total_hours: 0.0,
            },
            Some(record) => TodaySnapshot {
                status: if record.check_out_time.is_some() {
                    DayState::CheckedOut
                } else {
                    DayState::CheckedIn
                },
                check_in_time: record.check_in_time,
                check_out_time: record.check_out_time,
                total_hours: record.total_hours,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeStats {
    pub today: TodaySnapshot,
    pub monthly: AttendanceSummary,
    pub recent: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayCounts {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub half_day: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTrend {
    pub date: NaiveDate,
    pub day: String,
    #[serde(flatten)]
    pub counts: DayCounts,
}

impl DayTrend {
    /// `present` counts on-time records only; `absent` is everyone without
    /// an attended record, as in [`TeamRoster`].
    pub fn for_day(date: NaiveDate, total_employees: usize, records: &[&AttendanceRecord]) -> Self {
        let count = |status| records.iter().filter(|r| r.status == status).count();
        let attended = records.len() - count(AttendanceStatus::Absent);

        DayTrend {
            date,
            day: date.format("%a").to_string(),
            counts: DayCounts {
                present: count(AttendanceStatus::Present),
                absent: total_employees.saturating_sub(attended),
                late: count(AttendanceStatus::Late),
                half_day: count(AttendanceStatus::HalfDay),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentStat {
    pub department: String,
    pub total: usize,
    pub present: usize,
    pub absent: usize,
}

/// Per-department totals for one day, sorted by department name.
pub fn department_stats(employees: &[Employee], recorded: &HashSet<u64>) -> Vec<DepartmentStat> {
    let mut by_department: BTreeMap<&str, (usize, usize)> = BTreeMap::new();

    for employee in employees {
        let entry = by_department.entry(employee.department.as_str()).or_default();
        entry.0 += 1;
        if recorded.contains(&employee.id) {
            entry.1 += 1;
        }
    }

    by_department
        .into_iter()
        .map(|(department, (total, present))| DepartmentStat {
            department: department.to_string(),
            total,
            present,
            absent: total - present,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerStats {
    pub total_employees: usize,
    pub today_stats: DayCounts,
    pub absent_employees: Vec<Employee>,
    pub late_arrivals: Vec<AttendanceWithEmployee>,
    pub half_day_employees: Vec<AttendanceWithEmployee>,
    pub weekly_trend: Vec<DayTrend>,
    pub department_stats: Vec<DepartmentStat>,
}
