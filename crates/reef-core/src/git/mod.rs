//! Git-ref transport for snapshots.
//!
//! Snapshots travel through a dedicated ref outside `refs/heads/`, so sync
//! never touches branches, the index, or the working tree. Each publish is
//! one commit whose tree holds the snapshot file, parented on the remote tip
//! it was merged against; the push is never forced, which is what turns a
//! concurrent writer into a detectable non-fast-forward instead of lost data.

pub mod transport;

pub use transport::{
    DATA_REF, DEFAULT_REMOTE, GitTarget, Published, RemoteSnapshot, SNAPSHOT_PATH, TransportError,
    fetch_remote_snapshot, publish_snapshot,
};
