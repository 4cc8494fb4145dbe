pub mod attendance;
pub mod dashboard;
pub mod report;

use crate::store::mysql::MySqlStore;

/// The service as wired into the HTTP layer.
pub type AppAttendanceService = attendance::AttendanceService<MySqlStore>;
