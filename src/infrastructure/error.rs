use crate::domain::slot::ScheduleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Credential error: {0}")]
    Credential(String),
    #[error("Oracle error: {0}")]
    Oracle(String),
    #[error("Oracle timed out after {0} seconds")]
    OracleTimeout(u64),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}
