pub mod attendance;
pub mod period;
pub mod report;
pub mod role;
pub mod user;
