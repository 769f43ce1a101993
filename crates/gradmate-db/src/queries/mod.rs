pub mod plans;
pub mod usage_logs;
