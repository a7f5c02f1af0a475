//! SQLite read cache over the canonical snapshot file.
//!
//! The cache is derived state. Every import replaces its contents wholesale
//! from a decoded snapshot, and a fingerprint of the snapshot file (byte
//! length plus mtime) recorded in `cache_meta` tells callers whether the
//! cache still matches the file on disk. Deleting `cache.db` loses nothing.
//!
//! Connections are configured with:
//! - WAL journal mode for concurrent reads
//! - NORMAL synchronous (safe with WAL)
//! - Foreign key enforcement
//! - 5 second busy timeout

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;

pub mod migrations;
pub mod schema;
pub mod store;

pub use store::Store;

/// How long a connection waits on a locked database before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by the cache layer.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The directory holding the cache database could not be created.
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external link could not be serialized for storage.
    #[error("failed to encode external link for {id}: {source}")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// The underlying database reported an error.
    #[error("cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Identity of a snapshot file at a point in time.
///
/// Two fingerprints compare equal when the file has the same byte length and
/// modification time, which is how the cache decides whether a re-import is
/// needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    /// Byte length of the snapshot file.
    pub file_len: u64,
    /// Modification time in microseconds since the Unix epoch.
    pub file_mtime_us: i64,
}

impl Fingerprint {
    /// Fingerprint of the file at `path`, or `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but its metadata cannot be read.
    pub fn of_file(path: &Path) -> std::io::Result<Option<Self>> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error),
        };
        let file_mtime_us = metadata
            .modified()?
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| {
                i64::try_from(elapsed.as_micros()).unwrap_or(i64::MAX)
            });
        Ok(Some(Self {
            file_len: metadata.len(),
            file_mtime_us,
        }))
    }
}

// ---------------------------------------------------------------------------
// Connection setup
// ---------------------------------------------------------------------------

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    // `PRAGMA journal_mode = WAL` returns the resulting mode as a row, which
    // `pragma_update` rejects.
    let _journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{Fingerprint, Store, configure_connection};

    #[test]
    fn configure_sets_conservative_pragmas() {
        let dir = tempfile::tempdir().unwrap();
        let conn = rusqlite::Connection::open(dir.path().join("cache.db")).unwrap();
        configure_connection(&conn).unwrap();

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");

        let foreign_keys: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);

        let busy_timeout: i64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .unwrap();
        assert_eq!(busy_timeout, 5000);
    }

    #[test]
    fn open_creates_the_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");
        let _store = Store::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn of_file_is_none_for_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let fingerprint = Fingerprint::of_file(&dir.path().join("absent")).unwrap();
        assert!(fingerprint.is_none());
    }

    #[test]
    fn of_file_tracks_length_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.jsonl");
        std::fs::write(&path, b"one\n").unwrap();
        let first = Fingerprint::of_file(&path).unwrap().unwrap();
        assert_eq!(first.file_len, 4);

        std::fs::write(&path, b"one\ntwo\n").unwrap();
        let second = Fingerprint::of_file(&path).unwrap().unwrap();
        assert_eq!(second.file_len, 8);
        assert_ne!(first, second);
    }
}
