use chrono::{Duration, NaiveDateTime};
use std::collections::HashSet;

use crate::error::AttendanceError;
use crate::model::period::{DateRange, MonthPeriod};
use crate::model::report::{
    AttendanceSummary, DayCounts, DayTrend, EmployeeStats, ManagerStats, TeamRoster,
    TodaySnapshot, department_stats,
};
use crate::service::attendance::AttendanceService;
use crate::store::{AttendanceFilter, AttendanceStore, EmployeeStore};

const RECENT_DAYS: i64 = 7;
const TREND_DAYS: i64 = 7;

impl<S: AttendanceStore> AttendanceService<S> {
    pub async fn employee_stats(
        &self,
        user_id: u64,
        now: NaiveDateTime,
    ) -> Result<EmployeeStats, AttendanceError> {
        let today = now.date();
        let month = MonthPeriod::containing(now).ok_or(AttendanceError::InvalidPeriod)?;

        let today_record = self.store.find_by_user_and_date(user_id, today).await?;
        let monthly = self
            .store
            .list_for_user(user_id, Some(month.range()))
            .await?;
        let recent = self
            .store
            .list_for_user(user_id, Some(DateRange::trailing(today, RECENT_DAYS)))
            .await?;

        Ok(EmployeeStats {
            today: TodaySnapshot::from_record(today_record.as_ref()),
            monthly: AttendanceSummary::from_records(&monthly),
            recent,
        })
    }
}

impl<S: AttendanceStore + EmployeeStore> AttendanceService<S> {
    pub async fn manager_stats(&self, now: NaiveDateTime) -> Result<ManagerStats, AttendanceError> {
        let today = now.date();
        let roster = self.team_roster(today).await?;
        let employees = self.store.list_employees(None).await?;
        let total_employees = employees.len();

        let week = DateRange::trailing(today, TREND_DAYS - 1);
        let weekly = self
            .store
            .list(&AttendanceFilter {
                range: Some(week),
                status: None,
                user_ids: Some(employees.iter().map(|e| e.id).collect()),
            })
            .await?;

        let weekly_trend = (0..TREND_DAYS)
            .rev()
            .map(|days_back| {
                let date = today - Duration::days(days_back);
                let on_day: Vec<_> = weekly.iter().filter(|r| r.date == date).collect();
                DayTrend::for_day(date, total_employees, &on_day)
            })
            .collect();

        let recorded: HashSet<u64> = roster_user_ids(&roster);
        let department_stats = department_stats(&employees, &recorded);

        Ok(ManagerStats {
            total_employees,
            today_stats: DayCounts {
                present: roster.total_present,
                absent: roster.total_absent,
                late: roster.late.len(),
                half_day: roster.half_day.len(),
            },
            absent_employees: roster.absent,
            late_arrivals: roster.late,
            half_day_employees: roster.half_day,
            weekly_trend,
            department_stats,
        })
    }
}

fn roster_user_ids(roster: &TeamRoster) -> HashSet<u64> {
    roster
        .present
        .iter()
        .chain(&roster.late)
        .chain(&roster.half_day)
        .map(|entry| entry.employee.id)
        .collect()
}
