//! Record store abstraction.
//!
//! The `(user_id, date)` unique key on attendance records is enforced here,
//! by the store, and is the only concurrency control the service relies on.

pub mod mysql;

#[cfg(test)]
pub mod memory;

use chrono::NaiveDate;
use derive_more::Display;

use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::period::DateRange;
use crate::model::user::Employee;

#[derive(Debug, Display)]
pub enum StoreError {
    /// A unique key rejected the write.
    #[display(fmt = "constraint violation: {}", _0)]
    Conflict(String),

    /// The row to update no longer exists.
    #[display(fmt = "not found: {}", _0)]
    NotFound(String),

    #[display(fmt = "database error: {}", _0)]
    Database(sqlx::Error),

    /// A stored row could not be mapped back to a domain value.
    #[display(fmt = "data corruption: {}", _0)]
    DataCorruption(String),
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return StoreError::Conflict(db_err.message().to_string());
            }
        }
        StoreError::Database(e)
    }
}

/// Filter for team-wide listings. `user_ids: Some(vec![])` matches nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceFilter {
    pub range: Option<DateRange>,
    pub status: Option<AttendanceStatus>,
    pub user_ids: Option<Vec<u64>>,
}

impl AttendanceFilter {
    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        self.range.is_none_or(|r| r.contains(record.date))
            && self.status.is_none_or(|s| s == record.status)
            && self
                .user_ids
                .as_ref()
                .is_none_or(|ids| ids.contains(&record.user_id))
    }
}

pub trait AttendanceStore {
    async fn find_by_user_and_date(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    /// Inserts a new record and returns it with its assigned id.
    /// A second record for the same `(user_id, date)` fails with `Conflict`.
    async fn insert(&self, record: &AttendanceRecord) -> Result<AttendanceRecord, StoreError>;

    /// Sets check-in fields on a stored record that has no check-in yet.
    /// `Conflict` if it gained one meanwhile, `NotFound` if it was deleted.
    async fn save_check_in(&self, record: &AttendanceRecord) -> Result<(), StoreError>;

    /// Sets check-out fields on a stored record that has no check-out yet.
    /// `Conflict` if it gained one meanwhile, `NotFound` if it was deleted.
    async fn save_check_out(&self, record: &AttendanceRecord) -> Result<(), StoreError>;

    /// Returns whether a record was removed.
    async fn delete_by_user_and_date(&self, user_id: u64, date: NaiveDate)
    -> Result<bool, StoreError>;

    /// Newest first.
    async fn list_for_user(
        &self,
        user_id: u64,
        range: Option<DateRange>,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;

    /// Newest first.
    async fn list(&self, filter: &AttendanceFilter) -> Result<Vec<AttendanceRecord>, StoreError>;
}

pub trait EmployeeStore {
    /// Users with the employee role, optionally restricted to one department.
    async fn list_employees(&self, department: Option<&str>) -> Result<Vec<Employee>, StoreError>;

    async fn find_employee(&self, user_id: u64) -> Result<Option<Employee>, StoreError>;

    async fn find_employee_by_code(&self, code: &str) -> Result<Option<Employee>, StoreError>;
}
