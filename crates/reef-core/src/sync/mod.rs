//! Sync orchestrator: fetch, merge, write, publish.
//!
//! [`SyncProcess`] walks the phases with typestate guarantees:
//! - Idle → Fetched → Merged → Written, each transition consumes `self`
//! - Steps cannot be skipped or reordered; the compiler enforces the order
//!
//! Key design:
//! - Linear history: every publish parents on the fetched remote tip
//! - Retry on contention: re-fetch, re-merge, re-publish, bounded
//! - The canonical file is written before publishing, so a failed push
//!   leaves local state merged and consistent; re-running sync converges

pub mod auto;

use std::path::{Path, PathBuf};

use git2::{Oid, Repository};
use serde::Serialize;

use crate::cache::{Fingerprint, Store};
use crate::codec::{self, CodecError};
use crate::config::{REEF_DIR, SyncConfig};
use crate::error::ErrorCode;
use crate::git::{GitTarget, TransportError, fetch_remote_snapshot, publish_snapshot};
use crate::lock::{DEFAULT_LOCK_TIMEOUT, LockError, StoreLock};
use crate::merge::{ConflictDetail, merge_comments, merge_work_items};
use crate::model::{Comment, WorkItem};
use crate::workspace::{CACHE_FILE, LOCK_FILE, write_snapshot_atomic};

// ---------------------------------------------------------------------------
// Options and result
// ---------------------------------------------------------------------------

/// Knobs for one sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Snapshot file path, relative to the project root.
    pub file: String,
    pub target: GitTarget,
    /// When false, merge and write locally but skip the publish.
    pub push: bool,
    /// Stop after merging; report what would change without writing.
    pub dry_run: bool,
    /// Demote progress narration from info to trace level.
    pub silent: bool,
    /// How many times to retry after publish contention.
    pub max_retries: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            file: ".reef/issues.jsonl".to_string(),
            target: GitTarget::default(),
            push: true,
            dry_run: false,
            silent: false,
            max_retries: 3,
        }
    }
}

impl SyncOptions {
    /// Options derived from a `[sync]` config section.
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            file: config.file.clone(),
            target: GitTarget::new(&config.remote, &config.ref_name),
            push: config.push,
            dry_run: false,
            silent: false,
            max_retries: config.max_retries,
        }
    }
}

/// What one sync run did.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub items_added: usize,
    pub items_updated: usize,
    pub items_unchanged: usize,
    pub comments_added: usize,
    pub comments_unchanged: usize,
    /// Short greppable summaries, one per divergent pair.
    pub conflicts: Vec<String>,
    /// Structured record of every resolution, same order as `conflicts`.
    pub conflict_details: Vec<ConflictDetail>,
    pub pushed: bool,
    pub dry_run: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the sync pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("not a git repository at {path}: {source}")]
    OpenRepo {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The local snapshot file failed strict decoding. Nothing was mutated.
    #[error("local snapshot is malformed: {0}")]
    LocalSnapshot(#[source] CodecError),

    /// The fetched snapshot failed strict decoding. Publishing a merge of a
    /// half-read remote would erase the unread records everywhere.
    #[error("fetched snapshot is malformed: {0}")]
    FetchedSnapshot(#[source] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("publish contention persisted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

impl SyncError {
    /// Machine-readable code for the CLI boundary.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::OpenRepo { .. } => ErrorCode::NotAGitRepository,
            Self::ReadFile { .. } => ErrorCode::SnapshotReadFailed,
            Self::WriteFile { .. } => ErrorCode::SnapshotWriteFailed,
            Self::LocalSnapshot(_) | Self::FetchedSnapshot(_) => ErrorCode::CorruptRecord,
            Self::Transport(err) => match err {
                TransportError::NonFastForward => ErrorCode::PublishContention,
                TransportError::Fetch(_) => ErrorCode::RemoteMissing,
                TransportError::MissingFile(_) => ErrorCode::CorruptRecord,
                TransportError::Push(_) | TransportError::PushRejected { .. } => {
                    ErrorCode::PushFailed
                }
                _ => ErrorCode::InternalUnexpected,
            },
            Self::Lock(err) => err.code(),
            Self::RetriesExhausted { .. } => ErrorCode::SyncRetriesExhausted,
        }
    }
}

// ---------------------------------------------------------------------------
// Phase markers
// ---------------------------------------------------------------------------

/// Initial phase, ready to fetch.
pub struct Idle;

/// Both snapshots are in hand.
pub struct Fetched {
    local_items: Vec<WorkItem>,
    local_comments: Vec<Comment>,
    remote_items: Vec<WorkItem>,
    remote_comments: Vec<Comment>,
    /// Remote tip the next publish must parent on. `None` on first sync.
    parent: Option<Oid>,
}

/// Converged records, not yet on disk.
pub struct Merged {
    items: Vec<WorkItem>,
    comments: Vec<Comment>,
    result: SyncResult,
    parent: Option<Oid>,
}

/// Canonical file and cache are updated; encoded bytes ready to publish.
pub struct Written {
    bytes: Vec<u8>,
    result: SyncResult,
    parent: Option<Oid>,
}

// ---------------------------------------------------------------------------
// SyncProcess
// ---------------------------------------------------------------------------

/// One pass through the sync pipeline.
///
/// ```ignore
/// let result = SyncProcess::new(root, opts)
///     .fetch(&repo)?
///     .merge()
///     .write_local()?
///     .publish(&repo)?;
/// ```
pub struct SyncProcess<Phase> {
    root: PathBuf,
    opts: SyncOptions,
    phase: Phase,
}

impl SyncProcess<Idle> {
    #[must_use]
    pub fn new(root: PathBuf, opts: SyncOptions) -> Self {
        Self {
            root,
            opts,
            phase: Idle,
        }
    }

    /// Read the local snapshot and fetch the remote one.
    ///
    /// # Errors
    ///
    /// Fails on unreadable or malformed snapshots on either side, before
    /// anything local is mutated.
    pub fn fetch(self, repo: &Repository) -> Result<SyncProcess<Fetched>, SyncError> {
        let local_path = self.root.join(&self.opts.file);
        let local_bytes = match std::fs::read(&local_path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(SyncError::ReadFile {
                    path: local_path,
                    source,
                });
            }
        };
        let local = codec::decode_strict(&local_bytes).map_err(SyncError::LocalSnapshot)?;

        let remote = fetch_remote_snapshot(repo, &self.opts.target)?;
        let (remote_items, remote_comments, parent) = match remote {
            Some(snapshot) => {
                let decoded =
                    codec::decode_strict(&snapshot.bytes).map_err(SyncError::FetchedSnapshot)?;
                (decoded.items, decoded.comments, Some(snapshot.tip))
            }
            None => (Vec::new(), Vec::new(), None),
        };

        if self.opts.silent {
            tracing::trace!(
                local_items = local.items.len(),
                remote_items = remote_items.len(),
                first_sync = parent.is_none(),
                "fetched snapshots"
            );
        } else {
            tracing::info!(
                local_items = local.items.len(),
                remote_items = remote_items.len(),
                first_sync = parent.is_none(),
                "fetched snapshots"
            );
        }

        Ok(SyncProcess {
            root: self.root,
            opts: self.opts,
            phase: Fetched {
                local_items: local.items,
                local_comments: local.comments,
                remote_items,
                remote_comments,
                parent,
            },
        })
    }
}

impl SyncProcess<Fetched> {
    /// Converge the two sides. Pure; conflicts are outcomes, not errors.
    #[must_use]
    pub fn merge(self) -> SyncProcess<Merged> {
        let Fetched {
            local_items,
            local_comments,
            remote_items,
            remote_comments,
            parent,
        } = self.phase;

        let item_merge = merge_work_items(&local_items, &remote_items);
        let comment_merge = merge_comments(&local_comments, &remote_comments);

        let mut conflicts = item_merge.conflicts;
        conflicts.extend(comment_merge.conflicts);
        let mut conflict_details = item_merge.conflict_details;
        conflict_details.extend(comment_merge.conflict_details);

        let result = SyncResult {
            items_added: item_merge.added,
            items_updated: item_merge.updated,
            items_unchanged: item_merge.unchanged,
            comments_added: comment_merge.added,
            comments_unchanged: comment_merge.unchanged,
            conflicts,
            conflict_details,
            pushed: false,
            dry_run: self.opts.dry_run,
        };

        if self.opts.silent {
            tracing::trace!(
                added = result.items_added,
                updated = result.items_updated,
                conflicts = result.conflicts.len(),
                "merged snapshots"
            );
        } else {
            tracing::info!(
                added = result.items_added,
                updated = result.items_updated,
                conflicts = result.conflicts.len(),
                "merged snapshots"
            );
        }

        SyncProcess {
            root: self.root,
            opts: self.opts,
            phase: Merged {
                items: item_merge.items,
                comments: comment_merge.comments,
                result,
                parent,
            },
        }
    }
}

impl SyncProcess<Merged> {
    /// The merge outcome without touching disk. This is the dry-run exit.
    #[must_use]
    pub fn into_result(self) -> SyncResult {
        self.phase.result
    }

    /// Write the canonical file atomically and refresh the cache.
    ///
    /// A cache refresh failure is logged and tolerated: the cache is derived
    /// state and rebuilds itself from the file on the next read.
    ///
    /// # Errors
    ///
    /// Fails if the merged records cannot be encoded or the file write fails.
    pub fn write_local(self) -> Result<SyncProcess<Written>, SyncError> {
        let Merged {
            items,
            comments,
            result,
            parent,
        } = self.phase;

        let bytes = codec::encode(&items, &comments).map_err(SyncError::LocalSnapshot)?;
        let snapshot_path = self.root.join(&self.opts.file);
        write_snapshot_atomic(&snapshot_path, &bytes).map_err(|source| SyncError::WriteFile {
            path: snapshot_path.clone(),
            source,
        })?;

        if let Err(error) = refresh_cache(&self.root, &snapshot_path, &items, &comments) {
            tracing::warn!("cache refresh failed (will rebuild on next read): {error}");
        }

        Ok(SyncProcess {
            root: self.root,
            opts: self.opts,
            phase: Written {
                bytes,
                result,
                parent,
            },
        })
    }
}

impl SyncProcess<Written> {
    /// Publish the written snapshot, unless `push` is off.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NonFastForward`] (wrapped) when a concurrent
    /// writer won the race; the caller re-fetches and retries.
    pub fn publish(self, repo: &Repository) -> Result<SyncResult, SyncError> {
        let Written {
            bytes,
            mut result,
            parent,
        } = self.phase;

        if !self.opts.push {
            return Ok(result);
        }

        let message = commit_message(&result);
        let published = publish_snapshot(repo, &self.opts.target, &bytes, &message, parent)?;
        result.pushed = published.pushed;

        if self.opts.silent {
            tracing::trace!(commit = %published.commit, pushed = published.pushed, "published snapshot");
        } else {
            tracing::info!(commit = %published.commit, pushed = published.pushed, "published snapshot");
        }

        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Run a full sync with bounded retry on publish contention.
///
/// Takes the store lock for the whole run, so concurrent local mutations
/// wait rather than interleave.
///
/// # Errors
///
/// Any phase error aborts the run; see [`SyncError`]. Contention that
/// outlives `max_retries` becomes [`SyncError::RetriesExhausted`].
pub fn run_sync(project_root: &Path, opts: &SyncOptions) -> Result<SyncResult, SyncError> {
    let repo = Repository::open(project_root).map_err(|source| SyncError::OpenRepo {
        path: project_root.to_path_buf(),
        source,
    })?;

    let lock_path = project_root.join(REEF_DIR).join(LOCK_FILE);
    let _lock = StoreLock::acquire(&lock_path, DEFAULT_LOCK_TIMEOUT)?;

    let mut attempts: u32 = 0;
    loop {
        let merged = SyncProcess::new(project_root.to_path_buf(), opts.clone())
            .fetch(&repo)?
            .merge();

        if opts.dry_run {
            return Ok(merged.into_result());
        }

        match merged.write_local()?.publish(&repo) {
            Ok(result) => return Ok(result),
            Err(SyncError::Transport(error)) if error.is_contention() => {
                attempts += 1;
                if attempts > opts.max_retries {
                    return Err(SyncError::RetriesExhausted { attempts });
                }
                tracing::warn!(attempt = attempts, "publish contention, refetching");
            }
            Err(error) => return Err(error),
        }
    }
}

fn refresh_cache(
    root: &Path,
    snapshot_path: &Path,
    items: &[WorkItem],
    comments: &[Comment],
) -> Result<(), crate::cache::CacheError> {
    let mut store = Store::open(&root.join(REEF_DIR).join(CACHE_FILE))?;
    store.import(items)?;
    store.import_comments(comments)?;
    if let Some(fingerprint) = Fingerprint::of_file(snapshot_path).unwrap_or(None) {
        store.set_fingerprint(&fingerprint)?;
    }
    Ok(())
}

/// Commit message summarizing the delta, `reef: +2 items, ~1 updated` style.
fn commit_message(result: &SyncResult) -> String {
    let mut parts = Vec::new();
    if result.items_added > 0 {
        parts.push(format!("+{} items", result.items_added));
    }
    if result.items_updated > 0 {
        parts.push(format!("~{} updated", result.items_updated));
    }
    if result.comments_added > 0 {
        parts.push(format!("+{} comments", result.comments_added));
    }
    if !result.conflicts.is_empty() {
        parts.push(format!("{} conflicts resolved", result.conflicts.len()));
    }
    if parts.is_empty() {
        "reef: no changes".to_string()
    } else {
        format!("reef: {}", parts.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{SyncError, SyncOptions, SyncResult, commit_message};
    use crate::config::SyncConfig;
    use crate::error::ErrorCode;
    use crate::git::TransportError;
    use crate::lock::LockError;
    use std::time::Duration;

    #[test]
    fn options_come_from_the_config_section() {
        let config = SyncConfig {
            remote: "upstream".to_string(),
            ref_name: "refs/reef/alt".to_string(),
            file: "notes/issues.jsonl".to_string(),
            push: false,
            auto: true,
            debounce_ms: 100,
            max_retries: 7,
        };

        let opts = SyncOptions::from_config(&config);
        assert_eq!(opts.target.remote, "upstream");
        assert_eq!(opts.target.ref_name, "refs/reef/alt");
        assert_eq!(opts.file, "notes/issues.jsonl");
        assert!(!opts.push);
        assert!(!opts.dry_run);
        assert_eq!(opts.max_retries, 7);
    }

    #[test]
    fn commit_message_lists_only_nonzero_parts() {
        let result = SyncResult {
            items_added: 2,
            items_updated: 1,
            conflicts: vec!["x".to_string(), "y".to_string(), "z".to_string()],
            ..SyncResult::default()
        };
        assert_eq!(
            commit_message(&result),
            "reef: +2 items, ~1 updated, 3 conflicts resolved"
        );

        let comments_only = SyncResult {
            comments_added: 4,
            ..SyncResult::default()
        };
        assert_eq!(commit_message(&comments_only), "reef: +4 comments");

        assert_eq!(commit_message(&SyncResult::default()), "reef: no changes");
    }

    #[test]
    fn error_codes_map_per_failure_kind() {
        let contention = SyncError::Transport(TransportError::NonFastForward);
        assert_eq!(contention.error_code(), ErrorCode::PublishContention);

        let exhausted = SyncError::RetriesExhausted { attempts: 4 };
        assert_eq!(exhausted.error_code(), ErrorCode::SyncRetriesExhausted);

        let lock = SyncError::Lock(LockError::Timeout {
            path: "/tmp/reef.lock".into(),
            waited: Duration::from_secs(5),
        });
        assert_eq!(lock.error_code(), ErrorCode::LockContention);

        let rejected = SyncError::Transport(TransportError::PushRejected {
            message: "hook declined".to_string(),
        });
        assert_eq!(rejected.error_code(), ErrorCode::PushFailed);
    }

    #[test]
    fn sync_result_serializes_camel_case() {
        let json = serde_json::to_string(&SyncResult::default()).unwrap();
        assert!(json.contains("\"itemsAdded\""));
        assert!(json.contains("\"conflictDetails\""));
        assert!(json.contains("\"dryRun\""));
    }
}
