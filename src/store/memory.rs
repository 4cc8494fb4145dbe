use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::model::attendance::AttendanceRecord;
use crate::model::period::DateRange;
use crate::model::role::Role;
use crate::model::user::Employee;
use crate::store::{AttendanceFilter, AttendanceStore, EmployeeStore, StoreError};

/// In-memory store keyed on `(user_id, date)` with the same unique-key
/// behaviour as the `attendance` table. Counts writes so tests can assert
/// that rejected operations left the store untouched.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    records: BTreeMap<(u64, NaiveDate), AttendanceRecord>,
    employees: Vec<Employee>,
    writes: usize,
}

impl MemoryStore {
    pub fn with_employees(employees: Vec<Employee>) -> Self {
        let store = Self::default();
        store.lock().employees = employees;
        store
    }

    /// Puts a record in place without counting it as a write.
    pub fn seed(&self, record: AttendanceRecord) -> AttendanceRecord {
        let mut inner = self.lock();
        inner.next_id += 1;
        let record = AttendanceRecord {
            id: inner.next_id,
            ..record
        };
        inner
            .records
            .insert((record.user_id, record.date), record.clone());
        record
    }

    pub fn get(&self, user_id: u64, date: NaiveDate) -> Option<AttendanceRecord> {
        self.lock().records.get(&(user_id, date)).cloned()
    }

    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// Applies `write` to the stored copy of `record` when `open` holds for it,
    /// matching the row guard of the SQL `UPDATE`s.
    fn guarded_write(
        &self,
        record: &AttendanceRecord,
        open: impl Fn(&AttendanceRecord) -> bool,
        write: impl FnOnce(&mut AttendanceRecord),
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let stored = inner
            .records
            .values_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| StoreError::NotFound(format!("attendance {}", record.id)))?;

        if !open(stored) {
            return Err(StoreError::Conflict(format!(
                "attendance {} changed concurrently",
                record.id
            )));
        }

        write(stored);
        inner.writes += 1;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store lock poisoned")
    }
}

fn newest_first(mut records: Vec<AttendanceRecord>) -> Vec<AttendanceRecord> {
    records.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
    records
}

impl AttendanceStore for MemoryStore {
    async fn find_by_user_and_date(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self.get(user_id, date))
    }

    async fn insert(&self, record: &AttendanceRecord) -> Result<AttendanceRecord, StoreError> {
        let mut inner = self.lock();
        let key = (record.user_id, record.date);
        if inner.records.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "duplicate attendance for user {} on {}",
                record.user_id, record.date
            )));
        }

        inner.next_id += 1;
        let stored = AttendanceRecord {
            id: inner.next_id,
            ..record.clone()
        };
        inner.records.insert(key, stored.clone());
        inner.writes += 1;
        Ok(stored)
    }

    async fn save_check_in(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        self.guarded_write(record, |stored| stored.check_in_time.is_none(), |stored| {
            stored.check_in_time = record.check_in_time;
            stored.status = record.status;
        })
    }

    async fn save_check_out(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        self.guarded_write(record, |stored| stored.check_out_time.is_none(), |stored| {
            stored.check_out_time = record.check_out_time;
            stored.total_hours = record.total_hours;
            stored.status = record.status;
        })
    }

    async fn delete_by_user_and_date(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let removed = inner.records.remove(&(user_id, date)).is_some();
        inner.writes += 1;
        Ok(removed)
    }

    async fn list_for_user(
        &self,
        user_id: u64,
        range: Option<DateRange>,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let filter = AttendanceFilter {
            range,
            status: None,
            user_ids: Some(vec![user_id]),
        };
        self.list(&filter).await
    }

    async fn list(&self, filter: &AttendanceFilter) -> Result<Vec<AttendanceRecord>, StoreError> {
        let records = self
            .lock()
            .records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        Ok(newest_first(records))
    }
}

impl EmployeeStore for MemoryStore {
    async fn list_employees(&self, department: Option<&str>) -> Result<Vec<Employee>, StoreError> {
        Ok(self
            .lock()
            .employees
            .iter()
            .filter(|e| e.role == Role::Employee)
            .filter(|e| department.is_none_or(|d| e.department == d))
            .cloned()
            .collect())
    }

    async fn find_employee(&self, user_id: u64) -> Result<Option<Employee>, StoreError> {
        Ok(self.lock().employees.iter().find(|e| e.id == user_id).cloned())
    }

    async fn find_employee_by_code(&self, code: &str) -> Result<Option<Employee>, StoreError> {
        Ok(self
            .lock()
            .employees
            .iter()
            .find(|e| e.employee_code == code)
            .cloned())
    }
}
