//! `rf create` — add a new work item to the store.

use crate::author;
use crate::cmd::{open_workspace, parse_flag, resolve_item};
use crate::output::{OutputMode, render};
use anyhow::Result;
use chrono::Utc;
use clap::Args;
use reef_core::id;
use reef_core::model::{Priority, WorkItem};
use std::path::Path;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Title of the new item.
    pub title: String,

    /// Description text.
    #[arg(short, long)]
    pub description: Option<String>,

    /// Priority: low, medium, high, or critical.
    #[arg(short, long)]
    pub priority: Option<String>,

    /// Parent item ID (supports partial IDs).
    #[arg(long)]
    pub parent: Option<String>,

    /// Tag to attach (repeatable).
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Assignee name.
    #[arg(short, long)]
    pub assignee: Option<String>,

    /// Free-form workflow stage.
    #[arg(long)]
    pub stage: Option<String>,
}

/// Execute `rf create`.
///
/// # Errors
///
/// Returns an error if the priority value is invalid, the parent ID does
/// not resolve, or the store cannot be written.
pub fn run_create(
    args: &CreateArgs,
    author_flag: Option<&str>,
    output: OutputMode,
    cwd: &Path,
) -> Result<()> {
    let priority = parse_flag::<Priority>(args.priority.as_deref(), output)?;

    let ws = open_workspace(output, cwd)?;
    let created_by = author::resolve_author(author_flag);
    let now = Utc::now();

    let created = ws.mutate(|store| {
        let parent_id = match args.parent.as_deref() {
            None => None,
            Some(wanted) => Some(resolve_item(&store.items, wanted, output)?.id),
        };

        let id = id::mint_item_id(&args.title, now, |candidate| {
            store.items.iter().any(|item| item.id == candidate)
        });

        let mut item = WorkItem::new(id, &args.title, now);
        if let Some(ref description) = args.description {
            item.description.clone_from(description);
        }
        if let Some(priority) = priority {
            item.priority = priority;
        }
        item.parent_id = parent_id;
        item.tags.clone_from(&args.tags);
        item.assignee.clone_from(&args.assignee);
        item.stage.clone_from(&args.stage);
        item.created_by = created_by.clone();

        store.items.push(item.clone());
        Ok(item)
    })?;

    tracing::debug!(id = %created.id, "created item");
    crate::cmd::sync::auto_sync_if_enabled(ws.root(), &ws.config);

    render(output, &created, |item, w| {
        writeln!(w, "Created {}  {}", item.id, item.title)?;
        if !item.tags.is_empty() {
            writeln!(w, "  tags: {}", item.tags.join(", "))?;
        }
        if let Some(ref parent) = item.parent_id {
            writeln!(w, "  parent: {parent}")?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use reef_core::model::Status;
    use reef_core::workspace::Workspace;
    use std::path::PathBuf;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: CreateArgs,
    }

    fn project() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join(".reef")).expect("create .reef");
        let root = dir.path().to_path_buf();
        (dir, root)
    }

    #[test]
    fn create_args_defaults() {
        let w = Wrapper::parse_from(["test", "Fix login timeout"]);
        assert_eq!(w.args.title, "Fix login timeout");
        assert!(w.args.description.is_none());
        assert!(w.args.priority.is_none());
        assert!(w.args.tags.is_empty());
    }

    #[test]
    fn create_args_repeatable_tags() {
        let w = Wrapper::parse_from(["test", "t", "--tag", "backend", "--tag", "auth"]);
        assert_eq!(w.args.tags, vec!["backend", "auth"]);
    }

    #[test]
    fn create_adds_an_open_item() {
        let (_dir, root) = project();
        let args = Wrapper::parse_from(["test", "First item", "-p", "high", "-t", "backend"]).args;

        run_create(&args, Some("ana"), OutputMode::Json, &root).expect("create");

        let store = Workspace::open(&root).unwrap().load().unwrap();
        assert_eq!(store.items.len(), 1);
        let item = &store.items[0];
        assert!(item.id.starts_with("rf-"));
        assert_eq!(item.title, "First item");
        assert_eq!(item.status, Status::Open);
        assert_eq!(item.priority, Priority::High);
        assert_eq!(item.tags, vec!["backend"]);
        assert_eq!(item.created_by.as_deref(), Some("ana"));
    }

    #[test]
    fn invalid_priority_is_rejected_before_writing() {
        let (_dir, root) = project();
        let args = Wrapper::parse_from(["test", "t", "--priority", "urgent"]).args;

        assert!(run_create(&args, None, OutputMode::Json, &root).is_err());
        let store = Workspace::open(&root).unwrap().load().unwrap();
        assert!(store.items.is_empty());
    }

    #[test]
    fn parent_partial_id_is_canonicalized() {
        let (_dir, root) = project();
        run_create(
            &Wrapper::parse_from(["test", "Parent goal"]).args,
            None,
            OutputMode::Json,
            &root,
        )
        .expect("create parent");

        let parent_id = Workspace::open(&root).unwrap().load().unwrap().items[0]
            .id
            .clone();
        let fragment = parent_id.trim_start_matches("rf-").to_string();

        run_create(
            &Wrapper::parse_from(["test", "Child task", "--parent", &fragment]).args,
            None,
            OutputMode::Json,
            &root,
        )
        .expect("create child");

        let store = Workspace::open(&root).unwrap().load().unwrap();
        let child = store
            .items
            .iter()
            .find(|i| i.title == "Child task")
            .expect("child present");
        assert_eq!(child.parent_id.as_deref(), Some(parent_id.as_str()));
    }

    #[test]
    fn unknown_parent_is_an_error() {
        let (_dir, root) = project();
        let args = Wrapper::parse_from(["test", "t", "--parent", "zzzzzz"]).args;
        assert!(run_create(&args, None, OutputMode::Json, &root).is_err());
    }

    #[test]
    fn outside_a_project_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = Wrapper::parse_from(["test", "t"]).args;
        assert!(run_create(&args, None, OutputMode::Json, dir.path()).is_err());
    }
}
