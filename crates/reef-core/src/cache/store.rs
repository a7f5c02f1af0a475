//! Typed read/write access to the cache database.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params, types::Type};

use crate::model::{Comment, WorkItem};

use super::{CacheError, Fingerprint, configure_connection, migrations};

/// Handle on the cache database.
///
/// All reads reassemble full records, tags and refs in stored order, so a
/// round trip through the store is lossless.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the cache database at `path` and migrate it to the
    /// latest schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the database
    /// cannot be opened, configured, or migrated.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut conn = Connection::open(path)?;
        configure_connection(&conn)?;
        migrations::migrate(&mut conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory cache. Used by tests and by callers that only need
    /// a scratch store.
    ///
    /// # Errors
    ///
    /// Returns an error if configuring or migrating the database fails.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let mut conn = Connection::open_in_memory()?;
        configure_connection(&conn)?;
        migrations::migrate(&mut conn)?;
        Ok(Self { conn })
    }

    /// Replace every cached item with `items`, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; nothing is changed in that
    /// case.
    pub fn import(&mut self, items: &[WorkItem]) -> Result<(), CacheError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM item_tags", [])?;
        tx.execute("DELETE FROM items", [])?;
        {
            let mut insert_item = tx.prepare(
                "INSERT INTO items (
                    id, title, description, status, priority, sort_index,
                    parent_id, assignee, stage, issue_type, created_by,
                    deleted_by, delete_reason, external_json, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            )?;
            let mut insert_tag =
                tx.prepare("INSERT INTO item_tags (item_id, position, tag) VALUES (?1, ?2, ?3)")?;

            for item in items {
                let external_json = item
                    .external
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()
                    .map_err(|source| CacheError::Encode {
                        id: item.id.clone(),
                        source,
                    })?;

                insert_item.execute(params![
                    item.id,
                    item.title,
                    item.description,
                    item.status.as_str(),
                    item.priority.as_str(),
                    item.sort_index,
                    item.parent_id,
                    item.assignee,
                    item.stage,
                    item.issue_type,
                    item.created_by,
                    item.deleted_by,
                    item.delete_reason,
                    external_json,
                    item.created_at.to_rfc3339(),
                    item.updated_at.to_rfc3339(),
                ])?;

                for (position, tag) in item.tags.iter().enumerate() {
                    let position = i64::try_from(position).unwrap_or(i64::MAX);
                    insert_tag.execute(params![item.id, position, tag])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Replace every cached comment with `comments`, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; nothing is changed in that
    /// case.
    pub fn import_comments(&mut self, comments: &[Comment]) -> Result<(), CacheError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM comment_refs", [])?;
        tx.execute("DELETE FROM comments", [])?;
        {
            let mut insert_comment = tx.prepare(
                "INSERT INTO comments (id, item_id, author, text, external_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            let mut insert_ref = tx
                .prepare("INSERT INTO comment_refs (comment_id, position, ref) VALUES (?1, ?2, ?3)")?;

            for comment in comments {
                let external_json = comment
                    .external
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()
                    .map_err(|source| CacheError::Encode {
                        id: comment.id.clone(),
                        source,
                    })?;

                insert_comment.execute(params![
                    comment.id,
                    comment.item_id,
                    comment.author,
                    comment.text,
                    external_json,
                    comment.created_at.to_rfc3339(),
                ])?;

                for (position, reference) in comment.refs.iter().enumerate() {
                    let position = i64::try_from(position).unwrap_or(i64::MAX);
                    insert_ref.execute(params![comment.id, position, reference])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Every cached item, ordered by id, tags in stored order.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails or a stored row cannot be decoded.
    pub fn get_all(&self) -> Result<Vec<WorkItem>, CacheError> {
        let mut tags_by_item: HashMap<String, Vec<String>> = HashMap::new();
        {
            let mut stmt = self
                .conn
                .prepare("SELECT item_id, tag FROM item_tags ORDER BY item_id, position")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (item_id, tag) = row?;
                tags_by_item.entry(item_id).or_default().push(tag);
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, title, description, status, priority, sort_index,
                    parent_id, assignee, stage, issue_type, created_by,
                    deleted_by, delete_reason, external_json, created_at, updated_at
             FROM items ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            let status_raw: String = row.get(3)?;
            let priority_raw: String = row.get(4)?;
            let external_json: Option<String> = row.get(13)?;
            let created_raw: String = row.get(14)?;
            let updated_raw: String = row.get(15)?;

            Ok(WorkItem {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                status: status_raw
                    .parse()
                    .map_err(|error| column_error(3, error))?,
                priority: priority_raw
                    .parse()
                    .map_err(|error| column_error(4, error))?,
                sort_index: row.get(5)?,
                parent_id: row.get(6)?,
                created_at: parse_timestamp(&created_raw, 14)?,
                updated_at: parse_timestamp(&updated_raw, 15)?,
                tags: Vec::new(),
                assignee: row.get(7)?,
                stage: row.get(8)?,
                issue_type: row.get(9)?,
                created_by: row.get(10)?,
                deleted_by: row.get(11)?,
                delete_reason: row.get(12)?,
                external: external_json
                    .map(|raw| serde_json::from_str(&raw).map_err(|error| column_error(13, error)))
                    .transpose()?,
            })
        })?;

        let mut items = Vec::new();
        for row in rows {
            let mut item = row?;
            if let Some(tags) = tags_by_item.remove(&item.id) {
                item.tags = tags;
            }
            items.push(item);
        }
        Ok(items)
    }

    /// Every cached comment, ordered by id, refs in stored order.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails or a stored row cannot be decoded.
    pub fn get_all_comments(&self) -> Result<Vec<Comment>, CacheError> {
        let mut refs_by_comment: HashMap<String, Vec<String>> = HashMap::new();
        {
            let mut stmt = self
                .conn
                .prepare("SELECT comment_id, ref FROM comment_refs ORDER BY comment_id, position")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (comment_id, reference) = row?;
                refs_by_comment.entry(comment_id).or_default().push(reference);
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, item_id, author, text, external_json, created_at
             FROM comments ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            let external_json: Option<String> = row.get(4)?;
            let created_raw: String = row.get(5)?;

            Ok(Comment {
                id: row.get(0)?,
                item_id: row.get(1)?,
                author: row.get(2)?,
                text: row.get(3)?,
                created_at: parse_timestamp(&created_raw, 5)?,
                refs: Vec::new(),
                external: external_json
                    .map(|raw| serde_json::from_str(&raw).map_err(|error| column_error(4, error)))
                    .transpose()?,
            })
        })?;

        let mut comments = Vec::new();
        for row in rows {
            let mut comment = row?;
            if let Some(refs) = refs_by_comment.remove(&comment.id) {
                comment.refs = refs;
            }
            comments.push(comment);
        }
        Ok(comments)
    }

    /// The canonical-file fingerprint recorded by the last import, or `None`
    /// when nothing has been imported into this cache yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata row cannot be read.
    pub fn fingerprint(&self) -> Result<Option<Fingerprint>, CacheError> {
        let (file_len, file_mtime_us): (i64, i64) = self.conn.query_row(
            "SELECT file_len, file_mtime_us FROM cache_meta WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if file_len == 0 && file_mtime_us == 0 {
            return Ok(None);
        }
        Ok(Some(Fingerprint {
            file_len: u64::try_from(file_len).unwrap_or(0),
            file_mtime_us,
        }))
    }

    /// Record the canonical-file fingerprint after a successful import.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata row cannot be updated.
    pub fn set_fingerprint(&self, fingerprint: &Fingerprint) -> Result<(), CacheError> {
        self.conn.execute(
            "UPDATE cache_meta SET file_len = ?1, file_mtime_us = ?2 WHERE id = 1",
            params![
                i64::try_from(fingerprint.file_len).unwrap_or(i64::MAX),
                fingerprint.file_mtime_us
            ],
        )?;
        Ok(())
    }
}

fn column_error(
    index: usize,
    error: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
}

fn parse_timestamp(raw: &str, index: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|error| column_error(index, error))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
