//! Rows of the `processed_recordings` table.
//!
//! Raw SQL with rusqlite, no ORM. Rows are only ever inserted.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

/// A recording that has been handed to the pipeline.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub filename: String,
    pub source_path: String,
    pub processed_at: String,
}

pub struct LedgerRepository;

impl LedgerRepository {
    /// Insert `filename` unless it is already recorded.
    /// Returns true when a new row was written.
    pub fn insert_if_absent(conn: &Connection, filename: &str, source_path: &str) -> Result<bool> {
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO processed_recordings (filename, source_path) VALUES (?1, ?2)",
                params![filename, source_path],
            )
            .context("Failed to insert processed recording")?;
        Ok(changed == 1)
    }

    pub fn all_filenames(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare("SELECT filename FROM processed_recordings")
            .context("Failed to prepare query")?;

        let names = stmt
            .query_map([], |row| row.get(0))
            .context("Failed to query processed recordings")?
            .collect::<std::result::Result<Vec<String>, _>>()
            .context("Failed to map processed recordings")?;

        Ok(names)
    }

    pub fn recent(conn: &Connection, limit: usize) -> Result<Vec<LedgerEntry>> {
        let mut stmt = conn
            .prepare(
                "SELECT filename, source_path, processed_at FROM processed_recordings \
                 ORDER BY processed_at DESC, filename DESC LIMIT ?1",
            )
            .context("Failed to prepare query")?;

        let entries = stmt
            .query_map([limit as i64], |row| {
                Ok(LedgerEntry {
                    filename: row.get(0)?,
                    source_path: row.get(1)?,
                    processed_at: row.get(2)?,
                })
            })
            .context("Failed to query processed recordings")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to map processed recordings")?;

        Ok(entries)
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM processed_recordings", [], |row| {
                row.get(0)
            })
            .context("Failed to count processed recordings")?;
        Ok(count)
    }
}
