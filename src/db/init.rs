use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

/// Open the database at the default data-directory location.
pub fn init_db() -> Result<Connection> {
    let db_path = crate::global::db_file()?;
    open_db(&db_path)
}

pub fn open_db(db_path: &Path) -> Result<Connection> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(db_path).context("Failed to open database connection")?;

    migrate(&conn)?;

    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS processed_recordings (
            filename TEXT PRIMARY KEY NOT NULL,
            source_path TEXT NOT NULL,
            processed_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create processed_recordings table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_processed_recordings_processed_at
            ON processed_recordings(processed_at DESC)",
        [],
    )
    .context("Failed to create index on processed_at")?;

    Ok(())
}
