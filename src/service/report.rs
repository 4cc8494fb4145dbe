use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::AttendanceError;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::period::{DateRange, MonthPeriod};
use crate::model::report::{AttendanceSummary, AttendanceWithEmployee, TeamRoster, TeamSummary};
use crate::model::user::Employee;
use crate::service::attendance::AttendanceService;
use crate::store::{AttendanceFilter, AttendanceStore, EmployeeStore};

/// Manager-side listing criteria.
#[derive(Debug, Clone, Default)]
pub struct AttendanceQuery {
    /// Applied only when both ends are present.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
    /// Employee code, e.g. `EMP004`. Takes precedence over `department`.
    pub employee_code: Option<String>,
    pub department: Option<String>,
}

const CSV_HEADER: [&str; 9] = [
    "Employee ID",
    "Name",
    "Email",
    "Department",
    "Date",
    "Check In",
    "Check Out",
    "Status",
    "Total Hours",
];

fn format_time(time: Option<NaiveDateTime>) -> String {
    match time {
        Some(t) => t.format("%H:%M:%S").to_string(),
        None => "N/A".to_string(),
    }
}

impl<S: AttendanceStore + EmployeeStore> AttendanceService<S> {
    pub async fn employee(&self, user_id: u64) -> Result<Option<Employee>, AttendanceError> {
        Ok(self.store.find_employee(user_id).await?)
    }

    /// Who is in, late, on a half day, or absent on `date`.
    pub async fn team_roster(&self, date: NaiveDate) -> Result<TeamRoster, AttendanceError> {
        let employees = self.store.list_employees(None).await?;
        let filter = AttendanceFilter {
            range: Some(DateRange::single(date)),
            status: None,
            user_ids: Some(employees.iter().map(|e| e.id).collect()),
        };
        let records = self.store.list(&filter).await?;

        let roster = TeamRoster::build(date, &employees, records);
        debug!(
            %date,
            present = roster.total_present,
            absent = roster.total_absent,
            "Built team roster"
        );
        Ok(roster)
    }

    pub async fn team_summary(&self, period: MonthPeriod) -> Result<TeamSummary, AttendanceError> {
        let employees = self.store.list_employees(None).await?;
        let filter = AttendanceFilter {
            range: Some(period.range()),
            status: None,
            user_ids: Some(employees.iter().map(|e| e.id).collect()),
        };
        let records = self.store.list(&filter).await?;

        Ok(TeamSummary {
            total_employees: employees.len(),
            counts: AttendanceSummary::from_records(&records),
        })
    }

    /// Records of employees matching `query`, joined with their profile, newest first.
    pub async fn all_attendance(
        &self,
        query: &AttendanceQuery,
    ) -> Result<Vec<AttendanceWithEmployee>, AttendanceError> {
        let employees = match &query.employee_code {
            Some(code) => self
                .store
                .find_employee_by_code(code)
                .await?
                .into_iter()
                .collect(),
            None => self.store.list_employees(query.department.as_deref()).await?,
        };

        let range = match (query.start_date, query.end_date) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)),
            _ => None,
        };
        let filter = AttendanceFilter {
            range,
            status: query.status,
            user_ids: Some(employees.iter().map(|e| e.id).collect()),
        };
        let records = self.store.list(&filter).await?;

        Ok(join_employees(records, &employees))
    }

    pub async fn employee_attendance(
        &self,
        user_id: u64,
        period: Option<MonthPeriod>,
    ) -> Result<Vec<AttendanceWithEmployee>, AttendanceError> {
        let Some(employee) = self.store.find_employee(user_id).await? else {
            return Ok(Vec::new());
        };
        let records = self.history(user_id, period).await?;

        Ok(join_employees(records, std::slice::from_ref(&employee)))
    }

    /// CSV report of [`Self::all_attendance`] for the given window/employee.
    pub async fn export_csv(&self, query: &AttendanceQuery) -> Result<String, AttendanceError> {
        let rows = self.all_attendance(query).await?;
        let csv = render_csv(&rows)?;
        info!(rows = rows.len(), "Exported attendance report");
        Ok(csv)
    }
}

fn join_employees(
    records: Vec<AttendanceRecord>,
    employees: &[Employee],
) -> Vec<AttendanceWithEmployee> {
    let by_id: HashMap<u64, &Employee> = employees.iter().map(|e| (e.id, e)).collect();

    records
        .into_iter()
        .filter_map(|record| {
            let employee = (*by_id.get(&record.user_id)?).clone();
            Some(AttendanceWithEmployee { record, employee })
        })
        .collect()
}

pub fn render_csv(rows: &[AttendanceWithEmployee]) -> Result<String, AttendanceError> {
    let export_err = |e: csv::Error| AttendanceError::Export(e.to_string());
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(CSV_HEADER).map_err(export_err)?;
    for row in rows {
        let record = &row.record;
        let employee = &row.employee;
        let date = record.date.format("%Y-%m-%d").to_string();
        let check_in = format_time(record.check_in_time);
        let check_out = format_time(record.check_out_time);
        let hours = record.total_hours.to_string();
        writer
            .write_record([
                employee.employee_code.as_str(),
                employee.name.as_str(),
                employee.email.as_str(),
                employee.department.as_str(),
                date.as_str(),
                check_in.as_str(),
                check_out.as_str(),
                record.status.as_ref(),
                hours.as_str(),
            ])
            .map_err(export_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AttendanceError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| AttendanceError::Export(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::OfficeStartTime;
    use crate::model::role::Role;
    use crate::store::memory::MemoryStore;
    use chrono::Duration;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        day().and_hms_opt(h, m, 0).unwrap()
    }

    fn person(id: u64, department: &str, role: Role) -> Employee {
        Employee {
            id,
            name: format!("Person {id}"),
            email: format!("p{id}@company.com"),
            employee_code: format!("EMP{id:03}"),
            department: department.to_string(),
            role,
            is_approved: true,
            created_at: at(0, 0),
        }
    }

    fn service() -> (AttendanceService<MemoryStore>, MemoryStore) {
        let store = MemoryStore::with_employees(vec![
            person(1, "Engineering", Role::Employee),
            person(2, "Engineering", Role::Employee),
            person(3, "Sales", Role::Employee),
            person(4, "Sales", Role::Employee),
            person(9, "Management", Role::Manager),
        ]);
        (
            AttendanceService::new(store.clone(), OfficeStartTime::default()),
            store,
        )
    }

    #[actix_web::test]
    async fn employee_who_never_checks_in_is_absent() {
        let (service, store) = service();
        service.check_in(1, at(8, 45)).await.unwrap();
        service.check_in(2, at(9, 30)).await.unwrap();
        service.check_in(3, at(8, 0)).await.unwrap();
        service.check_out(3, at(12, 30)).await.unwrap();
        service.check_in(9, at(8, 0)).await.unwrap();

        let roster = service.team_roster(day()).await.unwrap();

        assert_eq!(roster.present.len(), 1);
        assert_eq!(roster.late.len(), 1);
        assert_eq!(roster.half_day.len(), 1);
        let absent: Vec<u64> = roster.absent.iter().map(|e| e.id).collect();
        assert_eq!(absent, vec![4]);
        assert!(store.get(4, day()).is_none());
        assert_eq!(roster.total_present, 3);
    }

    #[actix_web::test]
    async fn no_stored_record_is_absent() {
        let (service, store) = service();
        for user in [1, 2, 3] {
            service.check_in(user, at(9, 15)).await.unwrap();
            service.check_out(user, at(13, 45)).await.unwrap();
        }

        let filter = AttendanceFilter {
            status: Some(AttendanceStatus::Absent),
            ..Default::default()
        };
        assert!(store.list(&filter).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn team_summary_counts_employees_only() {
        let (service, _) = service();
        service.check_in(1, at(8, 45)).await.unwrap();
        service.check_out(1, at(17, 0)).await.unwrap();
        service.check_in(2, at(9, 45)).await.unwrap();
        service.check_in(9, at(9, 45)).await.unwrap();

        let summary = service
            .team_summary(MonthPeriod::new(2026, 3).unwrap())
            .await
            .unwrap();

        assert_eq!(summary.total_employees, 4);
        assert_eq!(summary.counts.present, 1);
        assert_eq!(summary.counts.late, 1);
        assert_eq!(summary.counts.total_hours, 8.25);
    }

    #[actix_web::test]
    async fn all_attendance_filters_by_department_and_status() {
        let (service, _) = service();
        service.check_in(1, at(9, 30)).await.unwrap();
        service.check_in(2, at(8, 30)).await.unwrap();
        service.check_in(3, at(9, 30)).await.unwrap();

        let query = AttendanceQuery {
            department: Some("Engineering".into()),
            status: Some(AttendanceStatus::Late),
            ..Default::default()
        };
        let rows = service.all_attendance(&query).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].employee.id, 1);
    }

    #[actix_web::test]
    async fn all_attendance_by_code_and_range() {
        let (service, _) = service();
        service.check_in(3, at(8, 30)).await.unwrap();
        service
            .check_in(3, at(8, 30) + Duration::days(3))
            .await
            .unwrap();
        service.check_in(4, at(8, 30)).await.unwrap();

        let query = AttendanceQuery {
            employee_code: Some("EMP003".into()),
            start_date: Some(day() + Duration::days(1)),
            end_date: Some(day() + Duration::days(5)),
            ..Default::default()
        };
        let rows = service.all_attendance(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record.date, day() + Duration::days(3));

        let unknown = AttendanceQuery {
            employee_code: Some("EMP404".into()),
            ..Default::default()
        };
        assert!(service.all_attendance(&unknown).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn csv_export_has_header_and_placeholders() {
        let (service, _) = service();
        service.check_in(1, at(8, 45)).await.unwrap();
        service.check_out(1, at(13, 15)).await.unwrap();
        service.check_in(2, at(9, 5)).await.unwrap();

        let csv = service
            .export_csv(&AttendanceQuery::default())
            .await
            .unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "Employee ID,Name,Email,Department,Date,Check In,Check Out,Status,Total Hours"
        );
        assert!(lines.contains(
            &"EMP001,Person 1,p1@company.com,Engineering,2026-03-09,08:45:00,13:15:00,half-day,4.5"
        ));
        assert!(lines.contains(
            &"EMP002,Person 2,p2@company.com,Engineering,2026-03-09,09:05:00,N/A,late,0"
        ));
    }
}
