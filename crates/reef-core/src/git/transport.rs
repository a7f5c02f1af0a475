//! Fetch and publish primitives for the snapshot data ref.

use std::cell::RefCell;

use git2::{ObjectType, Oid, Repository, Signature};

/// The ref snapshots are published under. Lives outside `refs/heads/` so no
/// branch UI ever shows it and no checkout can touch it.
pub const DATA_REF: &str = "refs/reef/data";

/// The remote used when none is configured explicitly.
pub const DEFAULT_REMOTE: &str = "origin";

/// Name of the snapshot file inside the data commit's tree.
pub const SNAPSHOT_PATH: &str = "issues.jsonl";

/// Where snapshots are exchanged: a remote name plus a data ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitTarget {
    pub remote: String,
    pub ref_name: String,
}

impl Default for GitTarget {
    fn default() -> Self {
        Self {
            remote: DEFAULT_REMOTE.to_string(),
            ref_name: DATA_REF.to_string(),
        }
    }
}

impl GitTarget {
    #[must_use]
    pub fn new(remote: impl Into<String>, ref_name: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            ref_name: ref_name.into(),
        }
    }

    /// Local ref mirroring the remote's last-seen tip of the data ref.
    ///
    /// The data ref is outside `refs/heads/`, so the stock
    /// `refs/remotes/<remote>/` tracking namespace never covers it; this
    /// carves out a reef-owned one instead.
    #[must_use]
    pub fn tracking_ref(&self) -> String {
        let suffix = self
            .ref_name
            .strip_prefix("refs/")
            .unwrap_or(&self.ref_name);
        format!("refs/reef/remotes/{}/{suffix}", self.remote)
    }

    /// Fetch refspec. Forced on the tracking side only: the tracking ref is
    /// a mirror of the remote, never a source of truth.
    #[must_use]
    pub fn fetch_refspec(&self) -> String {
        format!("+{}:{}", self.ref_name, self.tracking_ref())
    }

    /// Push refspec. Carries no force marker; a stale parent must fail.
    #[must_use]
    pub fn push_refspec(&self) -> String {
        format!("{}:{}", self.ref_name, self.ref_name)
    }
}

/// A snapshot fetched from the data ref.
#[derive(Debug, Clone)]
pub struct RemoteSnapshot {
    /// Raw snapshot bytes (JSONL).
    pub bytes: Vec<u8>,
    /// Commit the bytes came from; parent of the next publish.
    pub tip: Oid,
}

/// What a publish produced.
#[derive(Debug, Clone, Copy)]
pub struct Published {
    /// The new tip of the data ref.
    pub commit: Oid,
    /// False when no remote is configured (local-only repository).
    pub pushed: bool,
}

/// Errors from fetching or publishing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to fetch from remote: {0}")]
    Fetch(#[source] git2::Error),

    #[error("data ref exists but its tree has no '{0}'")]
    MissingFile(String),

    #[error("failed to write snapshot blob: {0}")]
    WriteBlob(#[source] git2::Error),

    #[error("failed to build snapshot tree: {0}")]
    BuildTree(#[source] git2::Error),

    #[error("failed to commit snapshot: {0}")]
    Commit(#[source] git2::Error),

    #[error("push rejected (non-fast-forward): a concurrent writer moved the data ref")]
    NonFastForward,

    #[error("push rejected: {message}")]
    PushRejected { message: String },

    #[error("failed to push: {0}")]
    Push(#[source] git2::Error),

    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
}

impl TransportError {
    /// True for the one failure a re-fetch, re-merge and retry can resolve.
    #[must_use]
    pub const fn is_contention(&self) -> bool {
        matches!(self, Self::NonFastForward)
    }
}

/// Fetch the remote's current snapshot, if it has one.
///
/// Returns `Ok(None)` when nothing has been published yet. A reachable
/// remote without the data ref fetches cleanly as a no-op and leaves the
/// tracking ref absent; with no remote configured the local data ref
/// stands in for the remote, which keeps history linear for later pushes.
///
/// # Errors
///
/// Any fetch failure is reported, never swallowed: an unreachable or
/// misauthenticated remote must abort the sync before anything local is
/// mutated.
pub fn fetch_remote_snapshot(
    repo: &Repository,
    target: &GitTarget,
) -> Result<Option<RemoteSnapshot>, TransportError> {
    let mut remote = match repo.find_remote(&target.remote) {
        Ok(remote) => remote,
        Err(_) => return read_ref_snapshot(repo, &target.ref_name),
    };

    let mut fetch_options = git2::FetchOptions::new();
    fetch_options.remote_callbacks(callbacks_with_credentials(repo.config().ok()));
    remote
        .fetch(
            &[target.fetch_refspec().as_str()],
            Some(&mut fetch_options),
            None,
        )
        .map_err(TransportError::Fetch)?;

    read_ref_snapshot(repo, &target.tracking_ref())
}

/// Commit `bytes` onto the data ref and push it.
///
/// The commit is created detached and the local data ref is then moved to
/// it; this sidesteps libgit2's current-tip check so a retry after
/// contention can still commit. Safety against clobbering lives in the
/// unforced push refspec: publishing over a tip we have not merged fails
/// with [`TransportError::NonFastForward`].
///
/// # Errors
///
/// Returns [`TransportError::NonFastForward`] when the remote moved since
/// `parent` was fetched; the caller is expected to re-fetch, re-merge and
/// try again.
pub fn publish_snapshot(
    repo: &Repository,
    target: &GitTarget,
    bytes: &[u8],
    message: &str,
    parent: Option<Oid>,
) -> Result<Published, TransportError> {
    let blob_oid = repo.blob(bytes).map_err(TransportError::WriteBlob)?;

    let mut builder = repo.treebuilder(None).map_err(TransportError::BuildTree)?;
    builder
        .insert(SNAPSHOT_PATH, blob_oid, 0o100_644)
        .map_err(TransportError::BuildTree)?;
    let tree_oid = builder.write().map_err(TransportError::BuildTree)?;
    let tree = repo.find_tree(tree_oid)?;

    let sig = repo
        .signature()
        .or_else(|_| Signature::now("reef", "reef@localhost"))?;

    let parents: Vec<git2::Commit<'_>> = match parent {
        Some(oid) => vec![repo.find_commit(oid)?],
        None => Vec::new(),
    };
    let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

    let commit = repo
        .commit(None, &sig, &sig, message, &tree, &parent_refs)
        .map_err(TransportError::Commit)?;
    repo.reference(&target.ref_name, commit, true, "reef: publish snapshot")
        .map_err(TransportError::Commit)?;

    let pushed = push_data_ref(repo, target)?;

    // Mirror the accepted tip so a fetch-less read sees what we published.
    repo.reference(&target.tracking_ref(), commit, true, "reef: update tracking")?;

    Ok(Published { commit, pushed })
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn push_data_ref(repo: &Repository, target: &GitTarget) -> Result<bool, TransportError> {
    let mut remote = match repo.find_remote(&target.remote) {
        Ok(remote) => remote,
        // No remote configured: the local ref update is the whole publish.
        Err(_) => return Ok(false),
    };

    let push_error: RefCell<Option<String>> = RefCell::new(None);
    {
        let mut callbacks = callbacks_with_credentials(repo.config().ok());
        callbacks.push_update_reference(|_ref_name, status| {
            if let Some(msg) = status {
                *push_error.borrow_mut() = Some(msg.to_string());
            }
            Ok(())
        });

        let mut push_options = git2::PushOptions::new();
        push_options.remote_callbacks(callbacks);

        if let Err(err) = remote.push(&[target.push_refspec().as_str()], Some(&mut push_options)) {
            if is_non_fast_forward(err.message()) {
                return Err(TransportError::NonFastForward);
            }
            return Err(TransportError::Push(err));
        }
    }

    if let Some(message) = push_error.into_inner() {
        if is_non_fast_forward(&message) {
            return Err(TransportError::NonFastForward);
        }
        return Err(TransportError::PushRejected { message });
    }

    Ok(true)
}

fn callbacks_with_credentials<'a>(cfg: Option<git2::Config>) -> git2::RemoteCallbacks<'a> {
    let mut callbacks = git2::RemoteCallbacks::new();
    callbacks.credentials(move |url, username_from_url, allowed| {
        if allowed.is_ssh_key() {
            if let Some(user) = username_from_url {
                return git2::Cred::ssh_key_from_agent(user);
            }
        }
        if allowed.is_user_pass_plaintext() {
            if let Some(cfg) = cfg.as_ref() {
                if let Ok(cred) = git2::Cred::credential_helper(cfg, url, username_from_url) {
                    return Ok(cred);
                }
            }
        }
        git2::Cred::default()
    });
    callbacks
}

fn read_ref_snapshot(
    repo: &Repository,
    ref_name: &str,
) -> Result<Option<RemoteSnapshot>, TransportError> {
    let Ok(tip) = repo.refname_to_id(ref_name) else {
        return Ok(None);
    };
    let commit = repo.find_commit(tip)?;
    let tree = commit.tree()?;
    let entry = tree
        .get_name(SNAPSHOT_PATH)
        .ok_or_else(|| TransportError::MissingFile(SNAPSHOT_PATH.to_string()))?;
    let blob = repo
        .find_object(entry.id(), Some(ObjectType::Blob))?
        .peel_to_blob()?;

    Ok(Some(RemoteSnapshot {
        bytes: blob.content().to_vec(),
        tip,
    }))
}

/// Messages libgit2 and real-world servers emit when the remote tip moved
/// under us. Local-path transports word it differently from smart HTTP.
fn is_non_fast_forward(message: &str) -> bool {
    let msg = message.to_lowercase();
    msg.contains("non-fast-forward")
        || msg.contains("non-fastforwardable")
        || msg.contains("fetch first")
        || msg.contains("cannot lock ref")
        || msg.contains("failed to update ref")
        || msg.contains("commits that are not present locally")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
