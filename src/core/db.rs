use std::path::Path;

use anyhow::{Error, Result};
use rusqlite::Connection as SyncConnection;
use tokio_rusqlite::Connection;

/// Opens (creating if needed) the sqlite database that holds study
/// sessions. `db_path` is a directory; the database file lives inside it.
pub async fn async_db(db_path: &str) -> Result<Connection, Error> {
    let db_file = Path::new(db_path).join("casechat.sqlite");
    let db = Connection::open(db_file).await?;
    Ok(db)
}

/// Creates the schema for the session aggregate. Safe to call repeatedly.
pub fn initialize_db(conn: &SyncConnection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS study_session (
            log_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            display_name TEXT,
            gender TEXT,
            case_id INTEGER NOT NULL,
            -- JSON array of personalized prompt lines, NULL until resolved
            prompt TEXT,
            prompt_source TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS study_turn (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            log_id TEXT NOT NULL REFERENCES study_session(log_id),
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS study_turn_log_id ON study_turn(log_id);
        CREATE INDEX IF NOT EXISTS study_session_user ON study_session(user_id, case_id);
        "#,
    )
}
