//! Project handle tying together config, snapshot file, cache, and lock.
//!
//! The snapshot file is the canonical store; the cache is derived and may be
//! deleted at any time. `load` reads through the cache, rebuilding it from
//! the file whenever the recorded fingerprint no longer matches, and `save`
//! writes the file atomically before refreshing the cache.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::cache::{Fingerprint, Store};
use crate::codec;
use crate::config::{self, REEF_DIR, ReefConfig};
use crate::lock::{DEFAULT_LOCK_TIMEOUT, LockError, StoreLock};
use crate::model::{Comment, WorkItem};

/// Cache database file name inside `.reef/`.
pub const CACHE_FILE: &str = "cache.db";

/// Lock file name inside `.reef/`.
pub const LOCK_FILE: &str = "reef.lock";

/// An open reef project.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    pub config: ReefConfig,
}

/// Records read from the store.
#[derive(Debug, Clone, Default)]
pub struct LoadedStore {
    pub items: Vec<WorkItem>,
    pub comments: Vec<Comment>,
}

impl Workspace {
    /// Open the project rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` has no `.reef/` directory or the config
    /// cannot be loaded.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.join(REEF_DIR).is_dir() {
            anyhow::bail!(
                "No .reef directory at {}. Run `rf init` first.",
                root.display()
            );
        }
        let config = config::load_config(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn reef_dir(&self) -> PathBuf {
        self.root.join(REEF_DIR)
    }

    /// Path of the canonical snapshot file, honoring `[sync] file`.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(&self.config.sync.file)
    }

    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.reef_dir().join(CACHE_FILE)
    }

    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.reef_dir().join(LOCK_FILE)
    }

    /// Take the exclusive store lock, waiting up to the default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] when another process holds the lock.
    pub fn lock(&self) -> Result<StoreLock, LockError> {
        StoreLock::acquire(&self.lock_path(), DEFAULT_LOCK_TIMEOUT)
    }

    /// Read all records, going through the cache when it is current.
    ///
    /// A missing snapshot file reads as an empty store. A stale or missing
    /// fingerprint triggers a rebuild from the file; malformed lines are
    /// skipped with a warning. An unusable cache database is deleted and
    /// recreated.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot file or the rebuilt cache cannot be
    /// read.
    pub fn load(&self) -> Result<LoadedStore> {
        let snapshot_path = self.snapshot_path();
        let on_disk = Fingerprint::of_file(&snapshot_path)
            .with_context(|| format!("Failed to stat {}", snapshot_path.display()))?;
        let Some(on_disk) = on_disk else {
            return Ok(LoadedStore::default());
        };

        let mut store = self.open_store()?;
        if store.fingerprint()? == Some(on_disk) {
            return Ok(LoadedStore {
                items: store.get_all()?,
                comments: store.get_all_comments()?,
            });
        }

        let bytes = std::fs::read(&snapshot_path)
            .with_context(|| format!("Failed to read {}", snapshot_path.display()))?;
        let decoded = codec::decode(&bytes)?;
        for error in &decoded.line_errors {
            tracing::warn!(
                line = error.line,
                "skipping malformed snapshot line: {}",
                error.message
            );
        }
        store.import(&decoded.items)?;
        store.import_comments(&decoded.comments)?;
        store.set_fingerprint(&on_disk)?;

        Ok(LoadedStore {
            items: decoded.items,
            comments: decoded.comments,
        })
    }

    /// Write all records to the snapshot file, then refresh the cache.
    ///
    /// The file is written to a temporary sibling and renamed into place.
    /// Callers mutating the store should hold the store lock across their
    /// whole read-modify-write window; [`Workspace::mutate`] does this.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding, the file write, or the cache refresh
    /// fails.
    pub fn save(&self, items: &[WorkItem], comments: &[Comment]) -> Result<()> {
        let bytes = codec::encode(items, comments)?;
        let snapshot_path = self.snapshot_path();
        write_snapshot_atomic(&snapshot_path, &bytes)
            .with_context(|| format!("Failed to write {}", snapshot_path.display()))?;

        let mut store = self.open_store()?;
        store.import(items)?;
        store.import_comments(comments)?;
        if let Some(fingerprint) = Fingerprint::of_file(&snapshot_path)
            .with_context(|| format!("Failed to stat {}", snapshot_path.display()))?
        {
            store.set_fingerprint(&fingerprint)?;
        }
        Ok(())
    }

    /// Lock, load, apply `apply`, and save the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be taken, the load or save fails,
    /// or `apply` itself fails (in which case nothing is written).
    pub fn mutate<T>(&self, apply: impl FnOnce(&mut LoadedStore) -> Result<T>) -> Result<T> {
        let _lock = self.lock()?;
        let mut store = self.load()?;
        let out = apply(&mut store)?;
        self.save(&store.items, &store.comments)?;
        Ok(out)
    }

    fn open_store(&self) -> Result<Store> {
        let path = self.cache_path();
        match Store::open(&path) {
            Ok(store) => Ok(store),
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    "cache unusable, rebuilding: {error}"
                );
                remove_with_sidecars(&path);
                Store::open(&path)
                    .with_context(|| format!("Failed to recreate cache at {}", path.display()))
            }
        }
    }
}

/// Write `bytes` to `path` via a temporary sibling file and an atomic rename.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or either the
/// write or the rename fails.
pub fn write_snapshot_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "snapshot path has no parent"))?;
    std::fs::create_dir_all(parent)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

fn remove_with_sidecars(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        let _ = std::fs::remove_file(PathBuf::from(&name));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
