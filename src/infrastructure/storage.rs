use crate::infrastructure::error::InfraError;
use rusqlite::Connection;
use std::path::Path;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent_and_creates_history_table() {
        let path = std::env::temp_dir().join(format!(
            "lifeloop-storage-test-{}.sqlite",
            std::process::id()
        ));
        initialize_database(&path).expect("first initialization");
        initialize_database(&path).expect("second initialization");

        let connection = Connection::open(&path).expect("open database");
        let count: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'daily_history'",
                [],
                |row| row.get(0),
            )
            .expect("query schema");
        assert_eq!(count, 1);

        drop(connection);
        let _ = std::fs::remove_file(&path);
    }
}
