use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::role::Role;

/// Public profile of a user. The password hash never leaves the auth layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 7,
    "name": "Jane Doe",
    "email": "jane@company.com",
    "employee_code": "EMP007",
    "department": "Engineering",
    "role": "employee",
    "is_approved": true,
    "created_at": "2026-01-01T09:00:00"
}))]
pub struct Employee {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub employee_code: String,
    pub department: String,
    #[schema(value_type = String, example = "employee")]
    pub role: Role,
    pub is_approved: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

const EMPLOYEE_CODE_PREFIX: &str = "EMP";

/// Next code in the `EMP001`, `EMP002`, ... sequence after `last`.
pub fn next_employee_code(last: Option<&str>) -> String {
    let last_number = last
        .and_then(|code| code.strip_prefix(EMPLOYEE_CODE_PREFIX))
        .and_then(|digits| digits.parse::<u32>().ok())
        .unwrap_or(0);

    format!("{}{:03}", EMPLOYEE_CODE_PREFIX, last_number + 1)
}
