//! SQLite schema for the reef read cache.
//!
//! Normalized for simple reassembly:
//! - `items` holds one row per work item with scalar fields inline
//! - `item_tags` and `comment_refs` keep ordered multi-valued fields, with
//!   `position` preserving canonical order
//! - `cache_meta` stores the schema version plus the canonical-file
//!   fingerprint used for staleness checks

/// Migration v1: all cache tables.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL CHECK (status IN ('open', 'in-progress', 'completed', 'blocked', 'deleted')),
    priority TEXT NOT NULL CHECK (priority IN ('low', 'medium', 'high', 'critical')),
    sort_index REAL NOT NULL DEFAULT 0,
    parent_id TEXT,
    assignee TEXT,
    stage TEXT,
    issue_type TEXT,
    created_by TEXT,
    deleted_by TEXT,
    delete_reason TEXT,
    external_json TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS item_tags (
    item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    tag TEXT NOT NULL,
    PRIMARY KEY (item_id, position)
);

CREATE TABLE IF NOT EXISTS comments (
    id TEXT PRIMARY KEY,
    item_id TEXT NOT NULL,
    author TEXT NOT NULL,
    text TEXT NOT NULL,
    external_json TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS comment_refs (
    comment_id TEXT NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    ref TEXT NOT NULL,
    PRIMARY KEY (comment_id, position)
);

CREATE TABLE IF NOT EXISTS cache_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    file_len INTEGER NOT NULL DEFAULT 0,
    file_mtime_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO cache_meta (id, schema_version, file_len, file_mtime_us)
VALUES (1, 1, 0, 0);
"#;
