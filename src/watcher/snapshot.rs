//! Directory snapshot reader.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One recording file as seen on a single poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingFileInfo {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified_at_ms: i64,
}

/// Lists recording files in the watched directory.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    dir: PathBuf,
    extension: String,
}

impl SnapshotReader {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            dir: dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the current set of recording files, sorted by name.
    ///
    /// A missing directory is an empty snapshot: the recorder may not have
    /// created it yet.
    pub fn read(&self) -> Result<Vec<RecordingFileInfo>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to list recordings in {:?}", self.dir))
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry =
                entry.with_context(|| format!("Failed to read entry in {:?}", self.dir))?;
            let path = entry.path();

            if !self.matches_extension(&path) {
                continue;
            }

            // The recorder may rename or remove a file between listing and stat.
            let metadata = match std::fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!("Skipping {:?}: {}", path, e);
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let modified_at_ms = match metadata.modified() {
                Ok(modified) => chrono::DateTime::<chrono::Utc>::from(modified).timestamp_millis(),
                Err(e) => {
                    debug!("Skipping {:?}: no modification time ({})", path, e);
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            files.push(RecordingFileInfo {
                name,
                path,
                size_bytes: metadata.len(),
                modified_at_ms,
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == self.extension)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let reader = SnapshotReader::new(dir.path().join("not-yet-created"), "flv");
        assert!(reader.read().unwrap().is_empty());
    }

    #[test]
    fn test_lists_only_recordings_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.flv"), b"12345").unwrap();
        std::fs::write(dir.path().join("a.flv"), b"").unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"converted").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("folder.flv")).unwrap();

        let reader = SnapshotReader::new(dir.path(), ".flv");
        let files = reader.read().unwrap();

        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.flv", "b.flv"]);
        assert_eq!(files[0].size_bytes, 0);
        assert_eq!(files[1].size_bytes, 5);
        assert_eq!(files[1].path, dir.path().join("b.flv"));
        assert!(files[1].modified_at_ms > 0);
    }

    #[test]
    fn test_extension_is_case_sensitive() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("upper.FLV"), b"data").unwrap();

        let reader = SnapshotReader::new(dir.path(), "flv");
        assert!(reader.read().unwrap().is_empty());
    }
}
