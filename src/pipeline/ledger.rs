//! Append-only record of recordings handed to the pipeline.

use anyhow::Result;
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;
use tracing::{error, info};

use crate::db::LedgerRepository;

/// Filenames already handed to the pipeline. Entries are never removed.
///
/// With a backing connection the set survives restarts; without one it
/// lives only as long as the process.
pub struct ProcessedLedger {
    seen: HashSet<String>,
    store: Option<Connection>,
}

impl ProcessedLedger {
    pub fn in_memory() -> Self {
        Self {
            seen: HashSet::new(),
            store: None,
        }
    }

    /// Load previously processed filenames from `conn` and keep writing to it.
    pub fn persistent(conn: Connection) -> Result<Self> {
        let seen: HashSet<String> = LedgerRepository::all_filenames(&conn)?.into_iter().collect();
        info!("Loaded {} processed recording(s) from ledger", seen.len());
        Ok(Self {
            seen,
            store: Some(conn),
        })
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.seen.contains(filename)
    }

    /// Record `filename`. Returns false if it was already present.
    pub fn insert(&mut self, filename: &str, source_path: &Path) -> bool {
        if !self.seen.insert(filename.to_string()) {
            return false;
        }

        if let Some(conn) = &self.store {
            // The in-memory entry still blocks duplicates for this process.
            if let Err(e) =
                LedgerRepository::insert_if_absent(conn, filename, &source_path.to_string_lossy())
            {
                error!("Failed to persist ledger entry for {}: {:#}", filename, e);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate;

    #[test]
    fn test_insert_once() {
        let mut ledger = ProcessedLedger::in_memory();
        assert!(ledger.is_empty());
        assert!(ledger.insert("rec1.flv", Path::new("/r/rec1.flv")));
        assert!(!ledger.insert("rec1.flv", Path::new("/r/rec1.flv")));
        assert!(ledger.contains("rec1.flv"));
        assert_eq!(ledger.len(), 1);
        assert!(!ledger.is_persistent());
    }

    #[test]
    fn test_persistent_ledger_survives_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let conn = crate::db::open_db(&path).unwrap();
            let mut ledger = ProcessedLedger::persistent(conn).unwrap();
            assert!(ledger.insert("rec1.flv", Path::new("/r/rec1.flv")));
        }

        let conn = crate::db::open_db(&path).unwrap();
        let mut ledger = ProcessedLedger::persistent(conn).unwrap();
        assert!(ledger.is_persistent());
        assert!(ledger.contains("rec1.flv"));
        assert!(!ledger.insert("rec1.flv", Path::new("/r/rec1.flv")));
    }

    #[test]
    fn test_persistent_ledger_writes_rows() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let mut ledger = ProcessedLedger::persistent(conn).unwrap();
        ledger.insert("a.flv", Path::new("/r/a.flv"));

        let conn = ledger.store.as_ref().unwrap();
        assert_eq!(LedgerRepository::count(conn).unwrap(), 1);
    }
}
