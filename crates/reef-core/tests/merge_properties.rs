//! Property tests for the merge engine and the snapshot codec.
//!
//! Ids are drawn from a deliberately tiny space so that the two generated
//! sides overlap often; overlapping ids are where all the interesting merge
//! behavior lives.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use reef_core::codec::{decode, encode};
use reef_core::merge::merge_work_items;
use reef_core::model::{Comment, Priority, Status, WorkItem};

type ItemPayload = (
    String,
    String,
    Status,
    Priority,
    u32,
    Vec<String>,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..2_000_000_000).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

fn status() -> impl Strategy<Value = Status> {
    prop_oneof![
        Just(Status::Open),
        Just(Status::InProgress),
        Just(Status::Completed),
        Just(Status::Blocked),
        Just(Status::Deleted),
    ]
}

fn priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Medium),
        Just(Priority::High),
        Just(Priority::Critical),
    ]
}

fn item_payload() -> impl Strategy<Value = ItemPayload> {
    (
        "[a-z ]{1,12}",
        "[a-z ]{0,20}",
        status(),
        priority(),
        0u32..10_000,
        prop::collection::vec("[a-z]{1,6}", 0..4),
        prop::option::of("[a-z]{2,8}"),
        timestamp(),
        timestamp(),
    )
}

fn build_item(id: String, payload: ItemPayload) -> WorkItem {
    let (title, description, status, priority, sort, tags, assignee, created, updated) = payload;
    let mut item = WorkItem::new(id, title, created);
    item.description = description;
    item.status = status;
    item.priority = priority;
    // sixteenths stay exact through JSON
    item.sort_index = f64::from(sort) / 16.0;
    item.tags = tags;
    item.assignee = assignee;
    item.updated_at = updated;
    item
}

fn item_set() -> impl Strategy<Value = Vec<WorkItem>> {
    prop::collection::btree_map("rf-[abc][123]", item_payload(), 0..5).prop_map(|by_id| {
        by_id
            .into_iter()
            .map(|(id, payload)| build_item(id, payload))
            .collect()
    })
}

type CommentPayload = (String, String, DateTime<Utc>, Vec<String>);

fn comment_payload() -> impl Strategy<Value = CommentPayload> {
    (
        "[a-z]{2,8}",
        "[a-z ]{0,16}",
        timestamp(),
        prop::collection::vec("[a-z]{1,5}", 0..3),
    )
}

fn build_comment(id: String, payload: CommentPayload) -> Comment {
    let (author, text, created, refs) = payload;
    let mut comment = Comment::new(id, "rf-a1", author, text, created);
    comment.refs = refs;
    comment
}

fn comment_set() -> impl Strategy<Value = Vec<Comment>> {
    prop::collection::btree_map("rf-a1-c[1-4]", comment_payload(), 0..4).prop_map(|by_id| {
        by_id
            .into_iter()
            .map(|(id, payload)| build_comment(id, payload))
            .collect()
    })
}

fn content_equal(xs: &[WorkItem], ys: &[WorkItem]) -> bool {
    xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| x.content_eq(y))
}

proptest! {
    #[test]
    fn prop_self_merge_is_identity(set in item_set()) {
        let merged = merge_work_items(&set, &set);

        let mut expected = set.clone();
        expected.sort_by(|a, b| a.id.cmp(&b.id));
        prop_assert_eq!(merged.items, expected);
        prop_assert!(merged.conflicts.is_empty());
        prop_assert_eq!(merged.added, 0);
        prop_assert_eq!(merged.unchanged, set.len());
    }

    #[test]
    fn prop_merge_sides_commute(a in item_set(), b in item_set()) {
        let ab = merge_work_items(&a, &b);
        let ba = merge_work_items(&b, &a);

        prop_assert_eq!(ab.items, ba.items, "record outcome must not depend on which side is local");
        prop_assert_eq!(ab.conflicts.len(), ba.conflicts.len());
        prop_assert_eq!(ab.added, ba.added);
        prop_assert_eq!(ab.updated, ba.updated);
        prop_assert_eq!(ab.unchanged, ba.unchanged);
    }

    #[test]
    fn prop_merged_ids_are_exactly_the_union(a in item_set(), b in item_set()) {
        let merged = merge_work_items(&a, &b);

        let expected: BTreeSet<&str> = a.iter().chain(b.iter()).map(|i| i.id.as_str()).collect();
        let got: BTreeSet<&str> = merged.items.iter().map(|i| i.id.as_str()).collect();
        prop_assert_eq!(&got, &expected);

        prop_assert_eq!(merged.added + merged.updated + merged.unchanged, expected.len());
    }

    #[test]
    fn prop_tags_never_shrink(a in item_set(), b in item_set()) {
        let merged = merge_work_items(&a, &b);
        let by_id: BTreeMap<&str, &WorkItem> =
            merged.items.iter().map(|i| (i.id.as_str(), i)).collect();

        for side in [&a, &b] {
            for item in side.iter() {
                let survivor = by_id[item.id.as_str()];
                for tag in &item.tags {
                    prop_assert!(
                        survivor.tag_set().contains(tag.as_str()),
                        "tag {} lost from {}", tag, item.id
                    );
                }
            }
        }
    }

    #[test]
    fn prop_remerging_the_survivors_changes_no_records(a in item_set(), b in item_set()) {
        let first = merge_work_items(&a, &b);
        let second = merge_work_items(&first.items, &b);

        // One-sided ids count as added from either direction, so the
        // re-merge re-counts every id b never had. What it must not do is
        // invent ids or change any record.
        let b_ids: BTreeSet<&str> = b.iter().map(|i| i.id.as_str()).collect();
        let beyond_b = first
            .items
            .iter()
            .filter(|i| !b_ids.contains(i.id.as_str()))
            .count();
        prop_assert_eq!(second.added, beyond_b);
        prop_assert_eq!(second.items.len(), first.items.len());
        prop_assert!(
            content_equal(&second.items, &first.items),
            "remerging an input changed the record set"
        );
    }

    #[test]
    fn prop_snapshot_roundtrip_preserves_records(
        items in item_set(),
        comments in comment_set(),
    ) {
        let bytes = encode(&items, &comments).unwrap();
        let decoded = decode(&bytes).unwrap();

        prop_assert!(decoded.line_errors.is_empty());

        let mut expected_items = items.clone();
        expected_items.sort_by(|a, b| a.id.cmp(&b.id));
        prop_assert_eq!(decoded.items, expected_items);

        let mut expected_comments = comments.clone();
        expected_comments.sort_by(|a, b| a.id.cmp(&b.id));
        prop_assert_eq!(decoded.comments, expected_comments);
    }
}
