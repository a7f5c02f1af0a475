//! Snapshot merge engine: union by id, later-write-wins per field.
//!
//! Combines two divergent record sets (local and remote) into one converged
//! set. This is the counterpart of a CRDT join for data that carries a
//! single `updated_at` per record instead of per-field metadata.
//!
//! # Merge Semantics
//!
//! Records are keyed by id. A record present on one side only is carried
//! over unchanged (the "addition" case, no conflict). A pair with equal
//! content counts as unchanged. A divergent pair is resolved field by
//! field: the side with the later `updated_at` supplies every divergent
//! field except `tags`, which always merge as a set union. Every resolution
//! is reported through [`ConflictDetail`]; nothing is dropped silently and
//! nothing is left ambiguous.
//!
//! # Tie-Breaking
//!
//! Two sides can disagree while carrying the same `updated_at` (wall clocks
//! collide across writers). The winner is then the record whose canonical
//! JSON encoding is lexicographically greater. The rule is arbitrary but
//! total and symmetric, so replicas converge no matter which side runs the
//! merge. Comments carry no `updated_at` at all and resolve a divergent
//! pair by the same canonical-encoding rule.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::model::{Comment, ExternalLink, WorkItem};

pub mod conflict;

pub use conflict::{
    ChosenSource, ConflictDetail, ConflictFieldDetail, ConflictKind, ConflictValue,
};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// The result of merging two work-item sets.
#[derive(Debug, Clone)]
pub struct ItemMerge {
    /// Converged items, sorted by id.
    pub items: Vec<WorkItem>,
    /// One human-readable summary per divergent pair.
    pub conflicts: Vec<String>,
    /// Structured record of every divergent pair, same order as `conflicts`.
    pub conflict_details: Vec<ConflictDetail>,
    /// Records present on one side only.
    pub added: usize,
    /// Divergent pairs that were resolved.
    pub updated: usize,
    /// Pairs with equal content.
    pub unchanged: usize,
}

/// The result of merging two comment sets.
///
/// Comments have no update counter: a divergent pair is counted by its
/// entry in `conflicts`, so `added + unchanged + conflicts.len()` covers
/// every distinct id.
#[derive(Debug, Clone)]
pub struct CommentMerge {
    /// Converged comments, sorted by id.
    pub comments: Vec<Comment>,
    pub conflicts: Vec<String>,
    pub conflict_details: Vec<ConflictDetail>,
    pub added: usize,
    pub unchanged: usize,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Merge two work-item sets keyed by id.
///
/// The output item list is sorted by id and is identical regardless of which
/// side is passed as `local`; only the local/remote labels inside the
/// conflict report depend on argument order.
///
/// # Examples
///
/// ```
/// use reef_core::merge::merge_work_items;
///
/// let result = merge_work_items(&[], &[]);
/// assert!(result.items.is_empty());
/// assert!(result.conflicts.is_empty());
/// ```
#[must_use]
pub fn merge_work_items(local: &[WorkItem], remote: &[WorkItem]) -> ItemMerge {
    let local_by_id: BTreeMap<&str, &WorkItem> =
        local.iter().map(|item| (item.id.as_str(), item)).collect();
    let remote_by_id: BTreeMap<&str, &WorkItem> =
        remote.iter().map(|item| (item.id.as_str(), item)).collect();
    let ids: BTreeSet<&str> = local_by_id
        .keys()
        .chain(remote_by_id.keys())
        .copied()
        .collect();

    let mut items = Vec::with_capacity(ids.len());
    let mut conflicts = Vec::new();
    let mut conflict_details = Vec::new();
    let (mut added, mut updated, mut unchanged) = (0usize, 0usize, 0usize);

    for id in ids {
        match (local_by_id.get(id), remote_by_id.get(id)) {
            (Some(only), None) | (None, Some(only)) => {
                items.push((*only).clone());
                added += 1;
            }
            (Some(local_item), Some(remote_item)) => {
                if local_item.content_eq(remote_item) {
                    items.push(keep_canonical_copy(*local_item, *remote_item).clone());
                    unchanged += 1;
                } else {
                    let resolved = resolve_items(local_item, remote_item);
                    items.push(resolved.record);
                    conflicts.push(resolved.summary);
                    conflict_details.push(resolved.detail);
                    updated += 1;
                }
            }
            (None, None) => {}
        }
    }

    ItemMerge {
        items,
        conflicts,
        conflict_details,
        added,
        updated,
        unchanged,
    }
}

/// Merge two comment sets keyed by id.
///
/// Union for one-sided ids; content equality for both-sided ids. A pair
/// that diverges has no timestamp to arbitrate with, so the canonical
/// tie-break picks the survivor and the pair is reported as a conflict.
#[must_use]
pub fn merge_comments(local: &[Comment], remote: &[Comment]) -> CommentMerge {
    let local_by_id: BTreeMap<&str, &Comment> =
        local.iter().map(|c| (c.id.as_str(), c)).collect();
    let remote_by_id: BTreeMap<&str, &Comment> =
        remote.iter().map(|c| (c.id.as_str(), c)).collect();
    let ids: BTreeSet<&str> = local_by_id
        .keys()
        .chain(remote_by_id.keys())
        .copied()
        .collect();

    let mut comments = Vec::with_capacity(ids.len());
    let mut conflicts = Vec::new();
    let mut conflict_details = Vec::new();
    let (mut added, mut unchanged) = (0usize, 0usize);

    for id in ids {
        match (local_by_id.get(id), remote_by_id.get(id)) {
            (Some(only), None) | (None, Some(only)) => {
                comments.push((*only).clone());
                added += 1;
            }
            (Some(local_comment), Some(remote_comment)) => {
                if local_comment == remote_comment {
                    comments.push((*local_comment).clone());
                    unchanged += 1;
                } else {
                    let resolved = resolve_comments(local_comment, remote_comment);
                    comments.push(resolved.record);
                    conflicts.push(resolved.summary);
                    conflict_details.push(resolved.detail);
                }
            }
            (None, None) => {}
        }
    }

    CommentMerge {
        comments,
        conflicts,
        conflict_details,
        added,
        unchanged,
    }
}

// ---------------------------------------------------------------------------
// Conflict resolution
// ---------------------------------------------------------------------------

struct Resolved<T> {
    record: T,
    summary: String,
    detail: ConflictDetail,
}

fn resolve_items(local: &WorkItem, remote: &WorkItem) -> Resolved<WorkItem> {
    use std::cmp::Ordering;

    let (kind, remote_wins) = match local.updated_at.cmp(&remote.updated_at) {
        Ordering::Less => (ConflictKind::DifferentTimestamp, true),
        Ordering::Greater => (ConflictKind::DifferentTimestamp, false),
        Ordering::Equal => (
            ConflictKind::SameTimestamp,
            canonical(remote) > canonical(local),
        ),
    };
    let (winner, loser, source) = if remote_wins {
        (remote, local, ChosenSource::Remote)
    } else {
        (local, remote, ChosenSource::Local)
    };

    let mut merged = winner.clone();
    merged.tags = union_tags(winner, loser);

    let fields = item_field_details(local, remote, &merged, kind, source);
    let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();

    let summary = match kind {
        // Every diffed field equal but updatedAt differs: nothing to list.
        ConflictKind::DifferentTimestamp if names.is_empty() => format!(
            "{}: Timestamp-only divergence; kept {source} copy (later updatedAt)",
            local.id,
        ),
        ConflictKind::DifferentTimestamp => format!(
            "{}: Conflicting fields [{}] resolved toward {source} (later updatedAt)",
            local.id,
            names.join(", "),
        ),
        ConflictKind::SameTimestamp => format!(
            "{}: Same updatedAt with divergent content; kept {source} copy by canonical tie-break",
            local.id,
        ),
    };

    let detail = ConflictDetail {
        id: local.id.clone(),
        kind,
        fields,
        local_updated_at: local.updated_at,
        remote_updated_at: remote.updated_at,
    };

    Resolved {
        record: merged,
        summary,
        detail,
    }
}

fn resolve_comments(local: &Comment, remote: &Comment) -> Resolved<Comment> {
    let remote_wins = canonical(remote) > canonical(local);
    let (winner, source) = if remote_wins {
        (remote, ChosenSource::Remote)
    } else {
        (local, ChosenSource::Local)
    };

    let reason = format!("no updatedAt on comments; kept {source} value by canonical tie-break");
    let mut fields = Vec::new();
    if local.item_id != remote.item_id {
        fields.push(field_detail(
            "itemId",
            ConflictValue::text(local.item_id.clone()),
            ConflictValue::text(remote.item_id.clone()),
            ConflictValue::text(winner.item_id.clone()),
            source,
            &reason,
        ));
    }
    if local.author != remote.author {
        fields.push(field_detail(
            "author",
            ConflictValue::text(local.author.clone()),
            ConflictValue::text(remote.author.clone()),
            ConflictValue::text(winner.author.clone()),
            source,
            &reason,
        ));
    }
    if local.text != remote.text {
        fields.push(field_detail(
            "text",
            ConflictValue::text(local.text.clone()),
            ConflictValue::text(remote.text.clone()),
            ConflictValue::text(winner.text.clone()),
            source,
            &reason,
        ));
    }
    if local.created_at != remote.created_at {
        fields.push(field_detail(
            "createdAt",
            ConflictValue::timestamp(local.created_at),
            ConflictValue::timestamp(remote.created_at),
            ConflictValue::timestamp(winner.created_at),
            source,
            &reason,
        ));
    }
    if local.refs != remote.refs {
        fields.push(field_detail(
            "refs",
            ConflictValue::list(&local.refs),
            ConflictValue::list(&remote.refs),
            ConflictValue::list(&winner.refs),
            source,
            &reason,
        ));
    }
    if local.external != remote.external {
        fields.push(field_detail(
            "external",
            optional_record_value(local.external.as_ref()),
            optional_record_value(remote.external.as_ref()),
            optional_record_value(winner.external.as_ref()),
            source,
            &reason,
        ));
    }

    let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
    let summary = format!(
        "{}: Conflicting fields [{}] on comment; kept {source} copy (canonical tie-break)",
        local.id,
        names.join(", "),
    );

    let detail = ConflictDetail {
        id: local.id.clone(),
        kind: ConflictKind::SameTimestamp,
        fields,
        local_updated_at: local.created_at,
        remote_updated_at: remote.created_at,
    };

    Resolved {
        record: winner.clone(),
        summary,
        detail,
    }
}

fn item_field_details(
    local: &WorkItem,
    remote: &WorkItem,
    merged: &WorkItem,
    kind: ConflictKind,
    source: ChosenSource,
) -> Vec<ConflictFieldDetail> {
    let reason = match kind {
        ConflictKind::DifferentTimestamp => format!("kept {source} value (later updatedAt)"),
        ConflictKind::SameTimestamp => {
            format!("same updatedAt; kept {source} value by canonical tie-break")
        }
    };

    let mut fields = Vec::new();
    if local.title != remote.title {
        fields.push(field_detail(
            "title",
            ConflictValue::text(local.title.clone()),
            ConflictValue::text(remote.title.clone()),
            ConflictValue::text(merged.title.clone()),
            source,
            &reason,
        ));
    }
    if local.description != remote.description {
        fields.push(field_detail(
            "description",
            ConflictValue::text(local.description.clone()),
            ConflictValue::text(remote.description.clone()),
            ConflictValue::text(merged.description.clone()),
            source,
            &reason,
        ));
    }
    if local.status != remote.status {
        fields.push(field_detail(
            "status",
            ConflictValue::text(local.status.to_string()),
            ConflictValue::text(remote.status.to_string()),
            ConflictValue::text(merged.status.to_string()),
            source,
            &reason,
        ));
    }
    if local.priority != remote.priority {
        fields.push(field_detail(
            "priority",
            ConflictValue::text(local.priority.to_string()),
            ConflictValue::text(remote.priority.to_string()),
            ConflictValue::text(merged.priority.to_string()),
            source,
            &reason,
        ));
    }
    if local.sort_index.total_cmp(&remote.sort_index).is_ne() {
        fields.push(field_detail(
            "sortIndex",
            ConflictValue::number(local.sort_index),
            ConflictValue::number(remote.sort_index),
            ConflictValue::number(merged.sort_index),
            source,
            &reason,
        ));
    }
    if local.parent_id != remote.parent_id {
        fields.push(field_detail(
            "parentId",
            ConflictValue::opt_text(local.parent_id.as_deref()),
            ConflictValue::opt_text(remote.parent_id.as_deref()),
            ConflictValue::opt_text(merged.parent_id.as_deref()),
            source,
            &reason,
        ));
    }
    if local.created_at != remote.created_at {
        fields.push(field_detail(
            "createdAt",
            ConflictValue::timestamp(local.created_at),
            ConflictValue::timestamp(remote.created_at),
            ConflictValue::timestamp(merged.created_at),
            source,
            &reason,
        ));
    }
    if local.tag_set() != remote.tag_set() {
        fields.push(field_detail(
            "tags",
            ConflictValue::list(&local.tags),
            ConflictValue::list(&remote.tags),
            ConflictValue::list(&merged.tags),
            ChosenSource::Merged,
            "tag sets merge as a union",
        ));
    }
    if local.assignee != remote.assignee {
        fields.push(field_detail(
            "assignee",
            ConflictValue::opt_text(local.assignee.as_deref()),
            ConflictValue::opt_text(remote.assignee.as_deref()),
            ConflictValue::opt_text(merged.assignee.as_deref()),
            source,
            &reason,
        ));
    }
    if local.stage != remote.stage {
        fields.push(field_detail(
            "stage",
            ConflictValue::opt_text(local.stage.as_deref()),
            ConflictValue::opt_text(remote.stage.as_deref()),
            ConflictValue::opt_text(merged.stage.as_deref()),
            source,
            &reason,
        ));
    }
    if local.issue_type != remote.issue_type {
        fields.push(field_detail(
            "issueType",
            ConflictValue::opt_text(local.issue_type.as_deref()),
            ConflictValue::opt_text(remote.issue_type.as_deref()),
            ConflictValue::opt_text(merged.issue_type.as_deref()),
            source,
            &reason,
        ));
    }
    if local.created_by != remote.created_by {
        fields.push(field_detail(
            "createdBy",
            ConflictValue::opt_text(local.created_by.as_deref()),
            ConflictValue::opt_text(remote.created_by.as_deref()),
            ConflictValue::opt_text(merged.created_by.as_deref()),
            source,
            &reason,
        ));
    }
    if local.deleted_by != remote.deleted_by {
        fields.push(field_detail(
            "deletedBy",
            ConflictValue::opt_text(local.deleted_by.as_deref()),
            ConflictValue::opt_text(remote.deleted_by.as_deref()),
            ConflictValue::opt_text(merged.deleted_by.as_deref()),
            source,
            &reason,
        ));
    }
    if local.delete_reason != remote.delete_reason {
        fields.push(field_detail(
            "deleteReason",
            ConflictValue::opt_text(local.delete_reason.as_deref()),
            ConflictValue::opt_text(remote.delete_reason.as_deref()),
            ConflictValue::opt_text(merged.delete_reason.as_deref()),
            source,
            &reason,
        ));
    }
    if local.external != remote.external {
        fields.push(field_detail(
            "external",
            external_value(local.external.as_ref()),
            external_value(remote.external.as_ref()),
            external_value(merged.external.as_ref()),
            source,
            &reason,
        ));
    }

    fields
}

fn field_detail(
    field: &str,
    local: ConflictValue,
    remote: ConflictValue,
    chosen: ConflictValue,
    chosen_source: ChosenSource,
    reason: &str,
) -> ConflictFieldDetail {
    ConflictFieldDetail {
        field: field.to_string(),
        local,
        remote,
        chosen,
        chosen_source,
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Union of both tag lists: the winner's tags in their original order, then
/// any loser-only tags in theirs. The winner is decided before the union is
/// built, so both replicas construct the same list.
fn union_tags(winner: &WorkItem, loser: &WorkItem) -> Vec<String> {
    let mut tags = winner.tags.clone();
    let seen: BTreeSet<&str> = winner.tags.iter().map(String::as_str).collect();
    for tag in &loser.tags {
        if !seen.contains(tag.as_str()) {
            tags.push(tag.clone());
        }
    }
    tags
}

/// Canonical encoding used for tie-breaks. Serialization of these records
/// only fails on non-finite floats; falling back to the debug form keeps
/// the comparison total in that corner.
fn canonical<T: Serialize + fmt::Debug>(record: &T) -> String {
    serde_json::to_string(record).unwrap_or_else(|_| format!("{record:?}"))
}

/// For a content-equal pair, keep the copy with the smaller canonical
/// encoding so that cosmetic divergence (tag order) still converges.
fn keep_canonical_copy<'a, T: Serialize + fmt::Debug>(local: &'a T, remote: &'a T) -> &'a T {
    if canonical(local) <= canonical(remote) {
        local
    } else {
        remote
    }
}

fn external_value(link: Option<&ExternalLink>) -> ConflictValue {
    link.map_or(ConflictValue::Null, |l| ConflictValue::text(canonical(l)))
}

fn optional_record_value<T: Serialize + fmt::Debug>(record: Option<&T>) -> ConflictValue {
    record.map_or(ConflictValue::Null, |r| ConflictValue::text(canonical(r)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
