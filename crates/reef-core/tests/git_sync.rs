//! End-to-end sync through real git repositories on disk: a bare "remote"
//! plus one or two working clones, exchanging snapshots over the data ref.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use git2::Repository;
use reef_core::cache::Store;
use reef_core::codec::{decode, encode};
use reef_core::error::ErrorCode;
use reef_core::git::DATA_REF;
use reef_core::model::{Comment, WorkItem};
use reef_core::sync::{SyncError, SyncOptions, SyncProcess, run_sync};
use reef_core::workspace::{Workspace, write_snapshot_atomic};
use tempfile::TempDir;

fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).unwrap()
}

fn item(id: &str, title: &str, day: u32) -> WorkItem {
    let mut item = WorkItem::new(id, title, ts(1));
    item.updated_at = ts(day);
    item
}

fn comment(id: &str, item_id: &str, text: &str) -> Comment {
    Comment::new(id, item_id, "ana", text, ts(1))
}

fn bare_remote(dir: &TempDir) -> String {
    let path = dir.path().join("remote.git");
    Repository::init_bare(&path).unwrap();
    path.to_string_lossy().into_owned()
}

fn clone_dir(dir: &TempDir, name: &str, remote_url: &str) -> PathBuf {
    let path = dir.path().join(name);
    let repo = Repository::init(&path).unwrap();
    repo.remote("origin", remote_url).unwrap();
    path
}

fn quiet_opts() -> SyncOptions {
    SyncOptions {
        silent: true,
        ..SyncOptions::default()
    }
}

fn write_snapshot(root: &Path, items: &[WorkItem], comments: &[Comment]) {
    let bytes = encode(items, comments).unwrap();
    write_snapshot_atomic(&root.join(".reef").join("issues.jsonl"), &bytes).unwrap();
}

fn snapshot_bytes(root: &Path) -> Vec<u8> {
    fs::read(root.join(".reef").join("issues.jsonl")).unwrap()
}

fn read_items(root: &Path) -> Vec<WorkItem> {
    decode(&snapshot_bytes(root)).unwrap().items
}

fn remote_tip(dir: &TempDir) -> Option<git2::Oid> {
    let repo = Repository::open(dir.path().join("remote.git")).unwrap();
    repo.refname_to_id(DATA_REF).ok()
}

#[test]
fn first_sync_publishes_the_local_snapshot() {
    let dir = TempDir::new().unwrap();
    let url = bare_remote(&dir);
    let writer = clone_dir(&dir, "writer", &url);
    write_snapshot(
        &writer,
        &[item("rf-aa", "first", 1), item("rf-bb", "second", 1)],
        &[],
    );

    let result = run_sync(&writer, &quiet_opts()).unwrap();

    assert_eq!(result.items_added, 2, "remote was empty, both items are new");
    assert!(result.conflicts.is_empty());
    assert!(result.pushed);
    assert!(remote_tip(&dir).is_some(), "the data ref must exist remotely");
}

#[test]
fn a_fresh_clone_receives_everything_on_sync() {
    let dir = TempDir::new().unwrap();
    let url = bare_remote(&dir);
    let writer = clone_dir(&dir, "writer", &url);
    write_snapshot(
        &writer,
        &[item("rf-aa", "first", 1), item("rf-bb", "second", 1)],
        &[comment("rf-aa-c1", "rf-aa", "hello")],
    );
    run_sync(&writer, &quiet_opts()).unwrap();

    // the reader starts with no .reef directory at all
    let reader = clone_dir(&dir, "reader", &url);
    let result = run_sync(&reader, &quiet_opts()).unwrap();

    assert_eq!(result.items_added, 2);
    assert_eq!(result.comments_added, 1);
    let items = read_items(&reader);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "rf-aa");
    assert_eq!(snapshot_bytes(&reader), snapshot_bytes(&writer));
}

#[test]
fn divergent_writers_converge_with_conflicts_reported() {
    let dir = TempDir::new().unwrap();
    let url = bare_remote(&dir);
    let alice = clone_dir(&dir, "alice", &url);
    let bob = clone_dir(&dir, "bob", &url);

    write_snapshot(&alice, &[item("rf-aa", "original", 1)], &[]);
    run_sync(&alice, &quiet_opts()).unwrap();
    run_sync(&bob, &quiet_opts()).unwrap();

    // both rename the shared item, bob later; each adds one of their own
    write_snapshot(
        &alice,
        &[
            item("rf-aa", "renamed by alice", 5),
            item("rf-al", "alice only", 1),
        ],
        &[],
    );
    write_snapshot(
        &bob,
        &[
            item("rf-aa", "renamed by bob", 7),
            item("rf-bo", "bob only", 1),
        ],
        &[],
    );

    run_sync(&alice, &quiet_opts()).unwrap();
    let bob_result = run_sync(&bob, &quiet_opts()).unwrap();

    assert_eq!(bob_result.items_added, 2, "one from each writer");
    assert_eq!(bob_result.items_updated, 1);
    assert_eq!(bob_result.conflicts.len(), 1);
    assert!(bob_result.conflicts[0].contains("rf-aa"));

    let alice_final = run_sync(&alice, &quiet_opts()).unwrap();
    assert_eq!(alice_final.items_added, 1, "bob's own item arrives");
    assert_eq!(alice_final.items_updated, 1, "the rename conflict resolves again");

    assert_eq!(
        snapshot_bytes(&alice),
        snapshot_bytes(&bob),
        "replicas must hold identical snapshot bytes"
    );
    let items = read_items(&alice);
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].title, "renamed by bob", "later rename wins");
}

#[test]
fn a_stale_publisher_gets_contention_then_converges_on_retry() {
    let dir = TempDir::new().unwrap();
    let url = bare_remote(&dir);
    let alice = clone_dir(&dir, "alice", &url);
    let bob = clone_dir(&dir, "bob", &url);

    write_snapshot(&alice, &[item("rf-aa", "original", 1)], &[]);
    run_sync(&alice, &quiet_opts()).unwrap();
    run_sync(&bob, &quiet_opts()).unwrap();

    // bob fetches and merges, then stalls while alice publishes a rename
    // on top of the tip bob is parenting on
    write_snapshot(
        &bob,
        &[item("rf-aa", "original", 1), item("rf-bo", "bob only", 1)],
        &[],
    );
    let bob_repo = Repository::open(&bob).unwrap();
    let stalled = SyncProcess::new(bob.clone(), quiet_opts())
        .fetch(&bob_repo)
        .unwrap()
        .merge();

    write_snapshot(&alice, &[item("rf-aa", "renamed by alice", 5)], &[]);
    run_sync(&alice, &quiet_opts()).unwrap();
    let tip_after_alice = remote_tip(&dir);

    let err = stalled.write_local().unwrap().publish(&bob_repo).unwrap_err();
    assert!(
        matches!(&err, SyncError::Transport(t) if t.is_contention()),
        "expected contention, got {err}"
    );
    assert_eq!(err.error_code(), ErrorCode::PublishContention);
    assert_eq!(remote_tip(&dir), tip_after_alice, "a losing publish must not move the remote");
    assert_eq!(read_items(&bob).len(), 2, "the local write before the failed push stays");

    // rerunning the full pipeline refetches the new tip, remerges, and wins
    let recovered = run_sync(&bob, &quiet_opts()).unwrap();
    assert!(recovered.pushed);
    assert_eq!(recovered.items_added, 1, "rf-bo is new to the remote");
    assert_eq!(recovered.items_updated, 1, "the rename conflict resolves");
    assert_ne!(remote_tip(&dir), tip_after_alice, "the retried publish lands");

    let alice_final = run_sync(&alice, &quiet_opts()).unwrap();
    assert_eq!(alice_final.items_added, 1, "bob's item reaches alice");
    assert_eq!(snapshot_bytes(&alice), snapshot_bytes(&bob));
    let items = read_items(&bob);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title, "renamed by alice", "neither writer's change is lost");
    assert_eq!(items[1].id, "rf-bo");
}

#[test]
fn a_converged_writer_reports_everything_unchanged() {
    let dir = TempDir::new().unwrap();
    let url = bare_remote(&dir);
    let writer = clone_dir(&dir, "writer", &url);
    write_snapshot(
        &writer,
        &[item("rf-aa", "a", 1), item("rf-bb", "b", 1)],
        &[],
    );

    let first = run_sync(&writer, &quiet_opts()).unwrap();
    assert_eq!(first.items_added, 2);

    let second = run_sync(&writer, &quiet_opts()).unwrap();
    assert_eq!(second.items_added, 0);
    assert_eq!(second.items_unchanged, 2);
    assert!(second.conflicts.is_empty());
}

#[test]
fn dry_run_reports_without_mutating_anything() {
    let dir = TempDir::new().unwrap();
    let url = bare_remote(&dir);
    let writer = clone_dir(&dir, "writer", &url);
    write_snapshot(&writer, &[item("rf-aa", "published", 1)], &[]);
    run_sync(&writer, &quiet_opts()).unwrap();
    let tip_before = remote_tip(&dir);

    let reader = clone_dir(&dir, "reader", &url);
    write_snapshot(&reader, &[item("rf-bb", "local draft", 1)], &[]);
    let bytes_before = snapshot_bytes(&reader);

    let opts = SyncOptions {
        dry_run: true,
        ..quiet_opts()
    };
    let result = run_sync(&reader, &opts).unwrap();

    assert!(result.dry_run);
    assert_eq!(result.items_added, 2, "the report still shows the would-be merge");
    assert!(!result.pushed);

    assert_eq!(snapshot_bytes(&reader), bytes_before, "file must be untouched");
    assert!(
        !reader.join(".reef").join("cache.db").exists(),
        "no cache refresh on a dry run"
    );
    let reader_repo = Repository::open(&reader).unwrap();
    assert!(reader_repo.refname_to_id(DATA_REF).is_err(), "nothing published");
    assert_eq!(remote_tip(&dir), tip_before, "remote must not move");
}

#[test]
fn push_off_merges_locally_without_publishing() {
    let dir = TempDir::new().unwrap();
    let url = bare_remote(&dir);
    let writer = clone_dir(&dir, "writer", &url);
    write_snapshot(&writer, &[item("rf-aa", "published", 1)], &[]);
    run_sync(&writer, &quiet_opts()).unwrap();
    let tip_before = remote_tip(&dir);

    let reader = clone_dir(&dir, "reader", &url);
    write_snapshot(&reader, &[item("rf-bb", "local draft", 1)], &[]);

    let opts = SyncOptions {
        push: false,
        ..quiet_opts()
    };
    let result = run_sync(&reader, &opts).unwrap();

    assert!(!result.pushed);
    assert_eq!(read_items(&reader).len(), 2, "the merge still lands locally");
    let reader_repo = Repository::open(&reader).unwrap();
    assert!(reader_repo.refname_to_id(DATA_REF).is_err());
    assert_eq!(remote_tip(&dir), tip_before);
}

#[test]
fn sync_outside_a_git_repository_is_a_typed_error() {
    let dir = TempDir::new().unwrap();

    let err = run_sync(dir.path(), &quiet_opts()).unwrap_err();

    assert!(matches!(err, SyncError::OpenRepo { .. }));
    assert_eq!(err.error_code(), ErrorCode::NotAGitRepository);
}

#[test]
fn malformed_local_snapshot_aborts_the_sync() {
    let dir = TempDir::new().unwrap();
    let url = bare_remote(&dir);
    let writer = clone_dir(&dir, "writer", &url);
    let reef_dir = writer.join(".reef");
    fs::create_dir_all(&reef_dir).unwrap();
    fs::write(reef_dir.join("issues.jsonl"), b"this is not json\n").unwrap();

    let err = run_sync(&writer, &quiet_opts()).unwrap_err();

    assert!(matches!(err, SyncError::LocalSnapshot(_)));
    assert_eq!(err.error_code(), ErrorCode::CorruptRecord);
    assert!(remote_tip(&dir).is_none(), "nothing may be published");
}

#[test]
fn sync_refreshes_the_read_cache() {
    let dir = TempDir::new().unwrap();
    let url = bare_remote(&dir);
    let writer = clone_dir(&dir, "writer", &url);
    write_snapshot(
        &writer,
        &[item("rf-aa", "a", 1), item("rf-bb", "b", 1)],
        &[comment("rf-aa-c1", "rf-aa", "note")],
    );

    run_sync(&writer, &quiet_opts()).unwrap();

    let store = Store::open(&writer.join(".reef").join("cache.db")).unwrap();
    assert_eq!(store.get_all().unwrap().len(), 2);
    assert_eq!(store.get_all_comments().unwrap().len(), 1);
    assert!(store.fingerprint().unwrap().is_some());
}

#[test]
fn workspace_reads_what_sync_wrote() {
    let dir = TempDir::new().unwrap();
    let url = bare_remote(&dir);
    let writer = clone_dir(&dir, "writer", &url);
    write_snapshot(&writer, &[item("rf-aa", "a", 1)], &[]);
    run_sync(&writer, &quiet_opts()).unwrap();

    let workspace = Workspace::open(&writer).unwrap();
    let loaded = workspace.load().unwrap();

    assert_eq!(loaded.items.len(), 1);
    assert_eq!(loaded.items[0].id, "rf-aa");
}
