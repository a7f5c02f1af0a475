//! `rf update` — edit fields on an existing work item.
//!
//! Every edit bumps `updatedAt`, which is what last-write-wins merges
//! compare. Deleted items only accept `--status` (restore first, then edit).

use crate::cmd::{open_workspace, parse_flag, resolve_item};
use crate::output::{CliError, OutputMode, render, render_error};
use anyhow::Result;
use chrono::Utc;
use clap::Args;
use reef_core::error::ErrorCode;
use reef_core::model::{Priority, Status, WorkItem};
use std::path::Path;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Item ID to update (supports partial IDs).
    pub id: String,

    /// New title.
    #[arg(long)]
    pub title: Option<String>,

    /// New description (replaces the old one).
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// New status (open, in-progress, completed, blocked, deleted).
    #[arg(long, short = 's')]
    pub status: Option<String>,

    /// New priority (low, medium, high, critical).
    #[arg(long, short = 'p')]
    pub priority: Option<String>,

    /// Re-parent under this item ID.
    #[arg(long, conflicts_with = "clear_parent")]
    pub parent: Option<String>,

    /// Detach from the current parent.
    #[arg(long)]
    pub clear_parent: bool,

    /// Add a tag (repeatable).
    #[arg(long = "add-tag", value_name = "TAG")]
    pub add_tags: Vec<String>,

    /// Remove a tag (repeatable).
    #[arg(long = "remove-tag", value_name = "TAG")]
    pub remove_tags: Vec<String>,

    /// New assignee.
    #[arg(long, short = 'a', conflicts_with = "clear_assignee")]
    pub assignee: Option<String>,

    /// Clear the assignee.
    #[arg(long)]
    pub clear_assignee: bool,

    /// New workflow stage.
    #[arg(long)]
    pub stage: Option<String>,

    /// New sibling sort position.
    #[arg(long, value_name = "N")]
    pub sort_index: Option<f64>,
}

impl UpdateArgs {
    fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.status.is_some()
            || self.priority.is_some()
            || self.parent.is_some()
            || self.clear_parent
            || !self.add_tags.is_empty()
            || !self.remove_tags.is_empty()
            || self.assignee.is_some()
            || self.clear_assignee
            || self.stage.is_some()
            || self.sort_index.is_some()
    }
}

fn apply_edits(
    item: &mut WorkItem,
    args: &UpdateArgs,
    status: Option<Status>,
    priority: Option<Priority>,
    parent_id: Option<String>,
) {
    if let Some(ref title) = args.title {
        item.title.clone_from(title);
    }
    if let Some(ref description) = args.description {
        item.description.clone_from(description);
    }
    if let Some(new_status) = status {
        item.status = new_status;
        if new_status != Status::Deleted {
            item.deleted_by = None;
            item.delete_reason = None;
        }
    }
    if let Some(new_priority) = priority {
        item.priority = new_priority;
    }
    if let Some(parent_id) = parent_id {
        item.parent_id = Some(parent_id);
    }
    if args.clear_parent {
        item.parent_id = None;
    }
    for tag in &args.add_tags {
        if !item.tags.iter().any(|have| have == tag) {
            item.tags.push(tag.clone());
        }
    }
    if !args.remove_tags.is_empty() {
        item.tags
            .retain(|have| !args.remove_tags.iter().any(|tag| tag == have));
    }
    if let Some(ref assignee) = args.assignee {
        item.assignee = Some(assignee.clone());
    }
    if args.clear_assignee {
        item.assignee = None;
    }
    if let Some(ref stage) = args.stage {
        item.stage = Some(stage.clone());
    }
    if let Some(sort_index) = args.sort_index {
        item.sort_index = sort_index;
    }
}

/// Execute `rf update <id> [field flags...]`.
///
/// # Errors
///
/// Returns an error if no field flags were given, the ID does not resolve,
/// an enum value is invalid, or the store cannot be written.
pub fn run_update(args: &UpdateArgs, output: OutputMode, cwd: &Path) -> Result<()> {
    if !args.has_changes() {
        let err = CliError::new("nothing to update; pass at least one field flag");
        render_error(output, &err)?;
        anyhow::bail!("{}", err.message);
    }

    let status: Option<Status> = parse_flag(args.status.as_deref(), output)?;
    let priority: Option<Priority> = parse_flag(args.priority.as_deref(), output)?;

    let ws = open_workspace(output, cwd)?;
    let now = Utc::now();

    let updated: WorkItem = ws.mutate(|store| {
        let id = resolve_item(&store.items, &args.id, output)?.id;

        let parent_id = match args.parent.as_deref() {
            None => None,
            Some(wanted) => {
                let parent = resolve_item(&store.items, wanted, output)?;
                if parent.id == id {
                    let err = CliError::new("an item cannot be its own parent");
                    render_error(output, &err)?;
                    anyhow::bail!("{}", err.message);
                }
                Some(parent.id)
            }
        };

        let item = store
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| anyhow::anyhow!("item vanished during update: {id}"))?;

        if item.is_deleted() && status.is_none() {
            let err = CliError::coded(
                ErrorCode::ItemNotFound,
                format!("{id} is deleted; pass --status open to restore it first"),
            );
            render_error(output, &err)?;
            anyhow::bail!("{}", err.message);
        }

        apply_edits(item, args, status, priority, parent_id);
        item.touch(now);
        Ok(item.clone())
    })?;

    tracing::debug!(id = %updated.id, "updated item");
    crate::cmd::sync::auto_sync_if_enabled(ws.root(), &ws.config);

    render(output, &updated, |item, w| {
        writeln!(w, "Updated {}  {}", item.id, item.title)?;
        writeln!(
            w,
            "  status: {}  priority: {}",
            item.status.as_str(),
            item.priority.as_str()
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use clap::Parser;
    use reef_core::workspace::Workspace;
    use std::path::PathBuf;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: UpdateArgs,
    }

    fn ts(day: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 0, 0, 0).unwrap()
    }

    fn project_with_items(items: &[WorkItem]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join(".reef")).expect("create .reef");
        let ws = Workspace::open(dir.path()).expect("open");
        ws.save(items, &[]).expect("save");
        let root = dir.path().to_path_buf();
        (dir, root)
    }

    fn load_one(root: &Path, id: &str) -> WorkItem {
        let ws = Workspace::open(root).expect("open");
        let store = ws.load().expect("load");
        store
            .items
            .into_iter()
            .find(|item| item.id == id)
            .expect("item present")
    }

    #[test]
    fn update_args_defaults() {
        let w = Wrapper::parse_from(["test", "rf-abc"]);
        assert_eq!(w.args.id, "rf-abc");
        assert!(!w.args.has_changes());
    }

    #[test]
    fn parent_conflicts_with_clear_parent() {
        let result =
            Wrapper::try_parse_from(["test", "rf-abc", "--parent", "rf-p", "--clear-parent"]);
        assert!(result.is_err());
    }

    #[test]
    fn assignee_conflicts_with_clear_assignee() {
        let result =
            Wrapper::try_parse_from(["test", "rf-abc", "--assignee", "ana", "--clear-assignee"]);
        assert!(result.is_err());
    }

    #[test]
    fn update_changes_fields_and_bumps_timestamp() {
        let item = WorkItem::new("rf-one", "Original", ts(1));
        let (_dir, root) = project_with_items(&[item]);

        let w = Wrapper::parse_from([
            "test",
            "rf-one",
            "--status",
            "in-progress",
            "--add-tag",
            "urgent",
            "-a",
            "ana",
        ]);
        run_update(&w.args, OutputMode::Json, &root).expect("update");

        let after = load_one(&root, "rf-one");
        assert_eq!(after.status, Status::InProgress);
        assert_eq!(after.tags, vec!["urgent".to_string()]);
        assert_eq!(after.assignee.as_deref(), Some("ana"));
        assert!(after.updated_at > ts(1));
    }

    #[test]
    fn restoring_a_deleted_item_clears_tombstone_fields() {
        let mut item = WorkItem::new("rf-gone", "Deleted thing", ts(1));
        item.status = Status::Deleted;
        item.deleted_by = Some("bob".to_string());
        item.delete_reason = Some("duplicate".to_string());
        let (_dir, root) = project_with_items(&[item]);

        let w = Wrapper::parse_from(["test", "rf-gone", "--status", "open"]);
        run_update(&w.args, OutputMode::Json, &root).expect("restore");

        let after = load_one(&root, "rf-gone");
        assert_eq!(after.status, Status::Open);
        assert_eq!(after.deleted_by, None);
        assert_eq!(after.delete_reason, None);
    }

    #[test]
    fn deleted_item_rejects_other_edits() {
        let mut item = WorkItem::new("rf-gone", "Deleted thing", ts(1));
        item.status = Status::Deleted;
        let (_dir, root) = project_with_items(&[item]);

        let w = Wrapper::parse_from(["test", "rf-gone", "--title", "New title"]);
        assert!(run_update(&w.args, OutputMode::Json, &root).is_err());

        let after = load_one(&root, "rf-gone");
        assert_eq!(after.title, "Deleted thing");
    }

    #[test]
    fn no_flags_means_nothing_to_update() {
        let item = WorkItem::new("rf-one", "Original", ts(1));
        let (_dir, root) = project_with_items(&[item]);

        let w = Wrapper::parse_from(["test", "rf-one"]);
        assert!(run_update(&w.args, OutputMode::Json, &root).is_err());
    }

    #[test]
    fn invalid_status_is_rejected_before_writing() {
        let item = WorkItem::new("rf-one", "Original", ts(1));
        let (_dir, root) = project_with_items(&[item]);

        let w = Wrapper::parse_from(["test", "rf-one", "--status", "finished"]);
        assert!(run_update(&w.args, OutputMode::Json, &root).is_err());

        let after = load_one(&root, "rf-one");
        assert_eq!(after.updated_at, ts(1));
    }

    #[test]
    fn remove_tag_drops_only_named_tags() {
        let mut item = WorkItem::new("rf-one", "Original", ts(1));
        item.tags = vec!["keep".to_string(), "drop".to_string()];
        let (_dir, root) = project_with_items(&[item]);

        let w = Wrapper::parse_from(["test", "rf-one", "--remove-tag", "drop"]);
        run_update(&w.args, OutputMode::Json, &root).expect("update");

        let after = load_one(&root, "rf-one");
        assert_eq!(after.tags, vec!["keep".to_string()]);
    }

    #[test]
    fn add_tag_is_idempotent() {
        let mut item = WorkItem::new("rf-one", "Original", ts(1));
        item.tags = vec!["urgent".to_string()];
        let (_dir, root) = project_with_items(&[item]);

        let w = Wrapper::parse_from(["test", "rf-one", "--add-tag", "urgent"]);
        run_update(&w.args, OutputMode::Json, &root).expect("update");

        let after = load_one(&root, "rf-one");
        assert_eq!(after.tags, vec!["urgent".to_string()]);
    }

    #[test]
    fn reparent_and_clear_parent() {
        let parent = WorkItem::new("rf-parent", "Parent", ts(1));
        let child = WorkItem::new("rf-child", "Child", ts(1));
        let (_dir, root) = project_with_items(&[parent, child]);

        let w = Wrapper::parse_from(["test", "rf-child", "--parent", "parent"]);
        run_update(&w.args, OutputMode::Json, &root).expect("reparent");
        assert_eq!(
            load_one(&root, "rf-child").parent_id.as_deref(),
            Some("rf-parent")
        );

        let w = Wrapper::parse_from(["test", "rf-child", "--clear-parent"]);
        run_update(&w.args, OutputMode::Json, &root).expect("clear");
        assert_eq!(load_one(&root, "rf-child").parent_id, None);
    }

    #[test]
    fn self_parent_is_rejected() {
        let item = WorkItem::new("rf-one", "Original", ts(1));
        let (_dir, root) = project_with_items(&[item]);

        let w = Wrapper::parse_from(["test", "rf-one", "--parent", "rf-one"]);
        assert!(run_update(&w.args, OutputMode::Json, &root).is_err());
    }

    #[test]
    fn unknown_id_fails() {
        let (_dir, root) = project_with_items(&[]);
        let w = Wrapper::parse_from(["test", "rf-missing", "--title", "x"]);
        assert!(run_update(&w.args, OutputMode::Json, &root).is_err());
    }
}
