use crate::domain::models::{validate_date_key, DailyRecord, Task};
use crate::infrastructure::error::InfraError;
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Per-user, per-day plan snapshots.
pub trait HistoryRepository: Send + Sync {
    fn save_plan(&self, user_id: &str, date_key: &str, tasks: &[Task]) -> Result<(), InfraError>;

    /// Up to `limit` days, most recent first.
    fn load_recent(&self, user_id: &str, limit: usize) -> Result<Vec<DailyRecord>, InfraError>;

    /// The plan saved for one day, or `None` if that day was never saved.
    fn load_day(&self, user_id: &str, date_key: &str) -> Result<Option<Vec<Task>>, InfraError>;
}

fn validate_key(user_id: &str, date_key: &str) -> Result<(), InfraError> {
    if user_id.trim().is_empty() {
        return Err(InfraError::InvalidConfig("user_id must not be empty".to_string()));
    }
    validate_date_key(date_key).map_err(InfraError::InvalidConfig)
}

#[derive(Debug, Clone)]
pub struct SqliteHistoryRepository {
    db_path: PathBuf,
}

impl SqliteHistoryRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }

    fn read_only(&self) -> Result<Connection, InfraError> {
        Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(InfraError::from)
    }

    fn read_rows(&self, user_id: &str) -> Result<Vec<(String, String)>, InfraError> {
        let connection = self.read_only()?;
        let mut statement = connection.prepare(
            "SELECT date_key, plan_json FROM daily_history
             WHERE user_id = ?1
             ORDER BY date_key DESC",
        )?;
        let rows = statement
            .query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn read_day(&self, user_id: &str, date_key: &str) -> Result<Option<String>, InfraError> {
        let connection = self.read_only()?;
        connection
            .query_row(
                "SELECT plan_json FROM daily_history WHERE user_id = ?1 AND date_key = ?2",
                params![user_id, date_key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(InfraError::from)
    }
}

impl HistoryRepository for SqliteHistoryRepository {
    fn save_plan(&self, user_id: &str, date_key: &str, tasks: &[Task]) -> Result<(), InfraError> {
        validate_key(user_id, date_key)?;
        let plan_json = serde_json::to_string(tasks)?;
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO daily_history (user_id, date_key, plan_json, saved_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, date_key) DO UPDATE SET
               plan_json = excluded.plan_json,
               saved_at = excluded.saved_at",
            params![user_id, date_key, plan_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // Unreadable stores and corrupt rows are reported and skipped; nothing is
    // rewritten on the read path so a damaged row can still be recovered by hand.
    // Corrupt rows do not count towards `limit`.
    fn load_recent(&self, user_id: &str, limit: usize) -> Result<Vec<DailyRecord>, InfraError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let rows = match self.read_rows(user_id) {
            Ok(rows) => rows,
            Err(error) => {
                warn!(
                    db_path = %self.db_path.display(),
                    %error,
                    "history store unreadable; treating as empty"
                );
                return Ok(Vec::new());
            }
        };

        Ok(rows
            .into_iter()
            .filter_map(|(date_key, plan_json)| {
                match serde_json::from_str::<Vec<Task>>(&plan_json) {
                    Ok(tasks) => Some(DailyRecord { date_key, tasks }),
                    Err(error) => {
                        warn!(user_id, date_key = date_key.as_str(), %error, "skipping corrupt history row");
                        None
                    }
                }
            })
            .take(limit)
            .collect())
    }

    fn load_day(&self, user_id: &str, date_key: &str) -> Result<Option<Vec<Task>>, InfraError> {
        validate_key(user_id, date_key)?;
        let plan_json = match self.read_day(user_id, date_key) {
            Ok(plan_json) => plan_json,
            Err(error) => {
                warn!(
                    db_path = %self.db_path.display(),
                    %error,
                    "history store unreadable; treating day as unsaved"
                );
                return Ok(None);
            }
        };
        Ok(plan_json.and_then(|plan_json| {
            serde_json::from_str::<Vec<Task>>(&plan_json)
                .map_err(|error| {
                    warn!(user_id, date_key, %error, "ignoring corrupt history row");
                })
                .ok()
        }))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryHistoryRepository {
    records: Mutex<HashMap<String, BTreeMap<String, Vec<Task>>>>,
}

impl HistoryRepository for InMemoryHistoryRepository {
    fn save_plan(&self, user_id: &str, date_key: &str, tasks: &[Task]) -> Result<(), InfraError> {
        validate_key(user_id, date_key)?;
        let mut records = self
            .records
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("history lock poisoned: {error}")))?;
        records
            .entry(user_id.to_string())
            .or_default()
            .insert(date_key.to_string(), tasks.to_vec());
        Ok(())
    }

    fn load_recent(&self, user_id: &str, limit: usize) -> Result<Vec<DailyRecord>, InfraError> {
        let records = self
            .records
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("history lock poisoned: {error}")))?;
        Ok(records
            .get(user_id)
            .map(|days| {
                days.iter()
                    .rev()
                    .take(limit)
                    .map(|(date_key, tasks)| DailyRecord {
                        date_key: date_key.clone(),
                        tasks: tasks.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn load_day(&self, user_id: &str, date_key: &str) -> Result<Option<Vec<Task>>, InfraError> {
        validate_key(user_id, date_key)?;
        let records = self
            .records
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("history lock poisoned: {error}")))?;
        Ok(records
            .get(user_id)
            .and_then(|days| days.get(date_key))
            .cloned())
    }
}
