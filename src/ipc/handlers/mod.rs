pub mod attendance;
pub mod backup_exchange;
pub mod core;
pub mod courses;
pub mod grades;
pub mod grading_scale;
pub mod reports;
pub mod school_years;
pub mod setup;
pub mod students;
