pub mod attendance;
pub mod classes;
pub mod core;
pub mod export;
pub mod import;
pub mod reports;
pub mod students;
