pub mod academic;
pub mod backup;
pub mod core;
pub mod dashboard;
pub mod evaluations;
pub mod exams;
pub mod planning;
pub mod services;
pub mod setup;
pub mod store_admin;
pub mod students;
