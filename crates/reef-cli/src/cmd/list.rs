//! `rf list` — list work items with filtering and an optional tree view.
//!
//! Deleted items are hidden unless `--all` is given or `--status deleted`
//! asks for them explicitly.

use crate::cmd::{open_workspace, parse_flag, resolve_item};
use crate::output::{OutputMode, pretty_rule, render_mode};
use anyhow::Result;
use clap::Args;
use reef_core::model::{Hierarchy, Priority, Status, WorkItem};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Filter by status: open, in-progress, completed, blocked, deleted.
    #[arg(short, long)]
    pub status: Option<String>,

    /// Filter by priority: low, medium, high, critical.
    #[arg(short, long)]
    pub priority: Option<String>,

    /// Filter by tag (repeatable; items must carry every given tag).
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Filter by assignee.
    #[arg(short, long)]
    pub assignee: Option<String>,

    /// Filter to direct children of this item (supports partial IDs).
    #[arg(long)]
    pub parent: Option<String>,

    /// Include deleted items.
    #[arg(long)]
    pub all: bool,

    /// Render the parent/child hierarchy as an indented tree.
    #[arg(long)]
    pub tree: bool,

    /// Maximum items to show.
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: usize,
}

/// The `rf list` payload: items in display order.
#[derive(Debug, Serialize)]
struct ListReport {
    total: usize,
    items: Vec<WorkItem>,
}

fn passes(
    item: &WorkItem,
    status: Option<Status>,
    priority: Option<Priority>,
    args: &ListArgs,
    parent_id: Option<&str>,
) -> bool {
    match status {
        Some(wanted) => {
            if item.status != wanted {
                return false;
            }
        }
        None => {
            if !args.all && item.is_deleted() {
                return false;
            }
        }
    }
    if let Some(wanted) = priority {
        if item.priority != wanted {
            return false;
        }
    }
    if !args
        .tags
        .iter()
        .all(|tag| item.tags.iter().any(|have| have == tag))
    {
        return false;
    }
    if let Some(wanted) = args.assignee.as_deref() {
        if item.assignee.as_deref() != Some(wanted) {
            return false;
        }
    }
    if let Some(wanted) = parent_id {
        if item.parent_id.as_deref() != Some(wanted) {
            return false;
        }
    }
    true
}

fn row(w: &mut dyn Write, depth: usize, item: &WorkItem) -> io::Result<()> {
    let indent = "  ".repeat(depth);
    let tags = if item.tags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", item.tags.join(", "))
    };
    writeln!(
        w,
        "{:<12} {:<12} {:<9} {indent}{}{tags}",
        item.id,
        item.status.as_str(),
        item.priority.as_str(),
        item.title,
    )
}

fn render_list_text(report: &ListReport, depths: &[usize], w: &mut dyn Write) -> io::Result<()> {
    for (item, depth) in report.items.iter().zip(depths) {
        row(w, *depth, item)?;
    }
    Ok(())
}

fn render_list_pretty(report: &ListReport, depths: &[usize], w: &mut dyn Write) -> io::Result<()> {
    if report.total == 0 {
        writeln!(w, "No items found.")?;
        return Ok(());
    }
    writeln!(w, "{:<12} {:<12} {:<9} TITLE", "ID", "STATUS", "PRIORITY")?;
    pretty_rule(w)?;
    for (item, depth) in report.items.iter().zip(depths) {
        row(w, *depth, item)?;
    }
    let hidden = report.total - report.items.len();
    if hidden > 0 {
        writeln!(w, "(+{hidden} more; raise --limit)")?;
    }
    writeln!(w)?;
    writeln!(w, "{} item(s)", report.total)?;
    Ok(())
}

/// Execute `rf list`.
///
/// # Errors
///
/// Returns an error if a filter value is invalid, the `--parent` ID does
/// not resolve, or the store cannot be read.
pub fn run_list(args: &ListArgs, output: OutputMode, cwd: &Path) -> Result<()> {
    let status = parse_flag::<Status>(args.status.as_deref(), output)?;
    let priority = parse_flag::<Priority>(args.priority.as_deref(), output)?;

    let ws = open_workspace(output, cwd)?;
    let store = ws.load()?;

    let parent_id = match args.parent.as_deref() {
        None => None,
        Some(wanted) => Some(resolve_item(&store.items, wanted, output)?.id),
    };

    let visible: Vec<WorkItem> = store
        .items
        .iter()
        .filter(|item| passes(item, status, priority, args, parent_id.as_deref()))
        .cloned()
        .collect();

    // Display order: tree walk when asked for, sibling order otherwise.
    let ordered: Vec<(usize, WorkItem)> = if args.tree {
        Hierarchy::build(&visible)
            .walk()
            .into_iter()
            .map(|(depth, item)| (depth, item.clone()))
            .collect()
    } else {
        let mut flat = visible;
        flat.sort_by(|a, b| {
            a.sort_index
                .total_cmp(&b.sort_index)
                .then_with(|| a.id.cmp(&b.id))
        });
        flat.into_iter().map(|item| (0, item)).collect()
    };

    let total = ordered.len();
    let shown = ordered.into_iter().take(args.limit);
    let (depths, items): (Vec<usize>, Vec<WorkItem>) = shown.unzip();
    let report = ListReport { total, items };

    render_mode(
        output,
        &report,
        |r, w| render_list_text(r, &depths, w),
        |r, w| render_list_pretty(r, &depths, w),
    )
}
