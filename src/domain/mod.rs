pub mod insights;
pub mod models;
pub mod scheduling;
pub mod slot;
