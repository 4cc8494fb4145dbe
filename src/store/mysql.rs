use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{FromRow, MySqlPool};
use std::str::FromStr;

use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::period::DateRange;
use crate::model::role::Role;
use crate::model::user::Employee;
use crate::store::{AttendanceFilter, AttendanceStore, EmployeeStore, StoreError};

const ATTENDANCE_COLUMNS: &str =
    "id, user_id, date, check_in_time, check_out_time, status, total_hours, created_at";

const EMPLOYEE_COLUMNS: &str =
    "id, name, email, employee_code, department, role_id, is_approved, created_at";

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    id: u64,
    user_id: u64,
    date: NaiveDate,
    check_in_time: Option<NaiveDateTime>,
    check_out_time: Option<NaiveDateTime>,
    status: String,
    total_hours: f64,
    created_at: NaiveDateTime,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let status = AttendanceStatus::from_str(&row.status).map_err(|_| {
            StoreError::DataCorruption(format!(
                "attendance {} has unknown status {:?}",
                row.id, row.status
            ))
        })?;

        Ok(AttendanceRecord {
            id: row.id,
            user_id: row.user_id,
            date: row.date,
            check_in_time: row.check_in_time,
            check_out_time: row.check_out_time,
            status,
            total_hours: row.total_hours,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct EmployeeRow {
    id: u64,
    name: String,
    email: String,
    employee_code: String,
    department: String,
    role_id: u8,
    is_approved: bool,
    created_at: NaiveDateTime,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = StoreError;

    fn try_from(row: EmployeeRow) -> Result<Self, Self::Error> {
        let role = Role::from_id(row.role_id).ok_or_else(|| {
            StoreError::DataCorruption(format!("user {} has unknown role {}", row.id, row.role_id))
        })?;

        Ok(Employee {
            id: row.id,
            name: row.name,
            email: row.email,
            employee_code: row.employee_code,
            department: row.department,
            role,
            is_approved: row.is_approved,
            created_at: row.created_at,
        })
    }
}

fn into_records(rows: Vec<AttendanceRow>) -> Result<Vec<AttendanceRecord>, StoreError> {
    rows.into_iter().map(AttendanceRecord::try_from).collect()
}

fn into_employees(rows: Vec<EmployeeRow>) -> Result<Vec<Employee>, StoreError> {
    rows.into_iter().map(Employee::try_from).collect()
}

// Typed values for dynamically built WHERE clauses
enum FilterValue<'a> {
    U64(u64),
    Date(NaiveDate),
    Str(&'a str),
}

impl MySqlStore {
    /// Tells a deleted row from one whose guard column was already set.
    async fn unmatched_update(&self, id: u64, field: &str) -> StoreError {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM attendance WHERE id = ?)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await;

        match exists {
            Ok(true) => StoreError::Conflict(format!("attendance {id} already has a {field}")),
            Ok(false) => StoreError::NotFound(format!("attendance {id}")),
            Err(e) => StoreError::from(e),
        }
    }
}

impl AttendanceStore for MySqlStore {
    async fn find_by_user_and_date(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM attendance WHERE user_id = ? AND date = ?",
            ATTENDANCE_COLUMNS
        );

        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(user_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        row.map(AttendanceRecord::try_from).transpose()
    }

    async fn insert(&self, record: &AttendanceRecord) -> Result<AttendanceRecord, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
                (user_id, date, check_in_time, check_out_time, status, total_hours, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.user_id)
        .bind(record.date)
        .bind(record.check_in_time)
        .bind(record.check_out_time)
        .bind(record.status.as_ref())
        .bind(record.total_hours)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(AttendanceRecord {
            id: result.last_insert_id(),
            ..record.clone()
        })
    }

    async fn save_check_in(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET check_in_time = ?, status = ?
            WHERE id = ? AND check_in_time IS NULL
            "#,
        )
        .bind(record.check_in_time)
        .bind(record.status.as_ref())
        .bind(record.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.unmatched_update(record.id, "check-in").await);
        }
        Ok(())
    }

    async fn save_check_out(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET check_out_time = ?, total_hours = ?, status = ?
            WHERE id = ? AND check_out_time IS NULL
            "#,
        )
        .bind(record.check_out_time)
        .bind(record.total_hours)
        .bind(record.status.as_ref())
        .bind(record.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.unmatched_update(record.id, "check-out").await);
        }
        Ok(())
    }

    async fn delete_by_user_and_date(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM attendance WHERE user_id = ? AND date = ?")
            .bind(user_id)
            .bind(date)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
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
        let mut where_sql = String::from(" WHERE 1=1");
        let mut args: Vec<FilterValue> = Vec::new();

        if let Some(range) = filter.range {
            where_sql.push_str(" AND date BETWEEN ? AND ?");
            args.push(FilterValue::Date(range.start));
            args.push(FilterValue::Date(range.end));
        }

        if let Some(status) = &filter.status {
            where_sql.push_str(" AND status = ?");
            args.push(FilterValue::Str(status.as_ref()));
        }

        if let Some(ids) = &filter.user_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; ids.len()].join(", ");
            where_sql.push_str(&format!(" AND user_id IN ({})", placeholders));
            args.extend(ids.iter().map(|id| FilterValue::U64(*id)));
        }

        let sql = format!(
            "SELECT {} FROM attendance{} ORDER BY date DESC, id DESC",
            ATTENDANCE_COLUMNS, where_sql
        );

        let mut query = sqlx::query_as::<_, AttendanceRow>(&sql);
        for arg in args {
            query = match arg {
                FilterValue::U64(v) => query.bind(v),
                FilterValue::Date(v) => query.bind(v),
                FilterValue::Str(v) => query.bind(v),
            };
        }

        into_records(query.fetch_all(&self.pool).await?)
    }
}

impl EmployeeStore for MySqlStore {
    async fn list_employees(&self, department: Option<&str>) -> Result<Vec<Employee>, StoreError> {
        let mut sql = format!("SELECT {} FROM users WHERE role_id = ?", EMPLOYEE_COLUMNS);
        if department.is_some() {
            sql.push_str(" AND department = ?");
        }
        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query_as::<_, EmployeeRow>(&sql).bind(Role::Employee.id());
        if let Some(department) = department {
            query = query.bind(department);
        }

        into_employees(query.fetch_all(&self.pool).await?)
    }

    async fn find_employee(&self, user_id: u64) -> Result<Option<Employee>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", EMPLOYEE_COLUMNS);

        sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Employee::try_from)
            .transpose()
    }

    async fn find_employee_by_code(&self, code: &str) -> Result<Option<Employee>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE employee_code = ?", EMPLOYEE_COLUMNS);

        sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .map(Employee::try_from)
            .transpose()
    }
}

/// Pending registrations, newest first.
pub(crate) async fn fetch_pending_employees(pool: &MySqlPool) -> Result<Vec<Employee>, StoreError> {
    let sql = format!(
        "SELECT {} FROM users WHERE role_id = ? AND is_approved = FALSE ORDER BY created_at DESC",
        EMPLOYEE_COLUMNS
    );

    let rows = sqlx::query_as::<_, EmployeeRow>(&sql)
        .bind(Role::Employee.id())
        .fetch_all(pool)
        .await?;

    into_employees(rows)
}
