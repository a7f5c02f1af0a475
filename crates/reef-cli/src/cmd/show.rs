//! `rf show` — display one work item in full.
//!
//! Accepts partial IDs: an exact id, a bare fragment (`k3x9q2` for
//! `rf-k3x9q2`), or a unique prefix of either form.

use crate::cmd::{open_workspace, resolve_item};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use reef_core::model::{Comment, WorkItem};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Item ID to display (supports partial IDs).
    pub id: String,
}

/// Full detail payload for one item.
#[derive(Debug, Serialize)]
struct ShowView {
    item: WorkItem,
    comments: Vec<Comment>,
    children: Vec<String>,
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Comments for `item_id` in timeline order: creation time, then id.
fn timeline_comments(comments: &[Comment], item_id: &str) -> Vec<Comment> {
    let mut own: Vec<Comment> = comments
        .iter()
        .filter(|c| c.item_id == item_id)
        .cloned()
        .collect();
    own.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    own
}

fn render_show_pretty(view: &ShowView, w: &mut dyn Write) -> io::Result<()> {
    let item = &view.item;
    pretty_section(w, &format!("{}  {}", item.id, item.title))?;
    pretty_kv(w, "status", item.status.as_str())?;
    pretty_kv(w, "priority", item.priority.as_str())?;
    if !item.tags.is_empty() {
        pretty_kv(w, "tags", item.tags.join(", "))?;
    }
    if let Some(ref assignee) = item.assignee {
        pretty_kv(w, "assignee", assignee)?;
    }
    if let Some(ref stage) = item.stage {
        pretty_kv(w, "stage", stage)?;
    }
    if let Some(ref parent) = item.parent_id {
        pretty_kv(w, "parent", parent)?;
    }
    pretty_kv(w, "created", format_ts(item.created_at))?;
    pretty_kv(w, "updated", format_ts(item.updated_at))?;
    if let Some(ref by) = item.created_by {
        pretty_kv(w, "created by", by)?;
    }
    if let Some(ref by) = item.deleted_by {
        pretty_kv(w, "deleted by", by)?;
    }
    if let Some(ref reason) = item.delete_reason {
        pretty_kv(w, "reason", reason)?;
    }

    if !item.description.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Description")?;
        for line in item.description.lines() {
            writeln!(w, "{line}")?;
        }
    }

    if !view.children.is_empty() {
        writeln!(w)?;
        pretty_kv(w, "children", view.children.join(", "))?;
    }

    if !view.comments.is_empty() {
        writeln!(w)?;
        pretty_section(w, &format!("Comments ({})", view.comments.len()))?;
        for (i, comment) in view.comments.iter().enumerate() {
            if i > 0 {
                writeln!(w)?;
            }
            writeln!(
                w,
                "[{}] {}: {}",
                format_ts(comment.created_at),
                comment.author,
                comment.text
            )?;
        }
    }
    Ok(())
}

fn render_show_text(view: &ShowView, w: &mut dyn Write) -> io::Result<()> {
    let item = &view.item;
    writeln!(w, "{}  {}", item.id, item.title)?;
    writeln!(w, "status:    {}", item.status.as_str())?;
    writeln!(w, "priority:  {}", item.priority.as_str())?;
    if !item.tags.is_empty() {
        writeln!(w, "tags:      {}", item.tags.join(", "))?;
    }
    if let Some(ref assignee) = item.assignee {
        writeln!(w, "assignee:  {assignee}")?;
    }
    if let Some(ref parent) = item.parent_id {
        writeln!(w, "parent:    {parent}")?;
    }
    writeln!(w, "updated:   {}", format_ts(item.updated_at))?;
    if !item.description.is_empty() {
        writeln!(w, "description: {}", item.description)?;
    }
    if !view.children.is_empty() {
        writeln!(w, "children:  {}", view.children.join(", "))?;
    }
    for comment in &view.comments {
        writeln!(
            w,
            "comment [{}] {}: {}",
            format_ts(comment.created_at),
            comment.author,
            comment.text
        )?;
    }
    Ok(())
}

/// Execute `rf show <id>`.
///
/// # Errors
///
/// Returns an error if the ID does not resolve to exactly one item or the
/// store cannot be read.
pub fn run_show(args: &ShowArgs, output: OutputMode, cwd: &Path) -> Result<()> {
    let ws = open_workspace(output, cwd)?;
    let store = ws.load()?;
    let item = resolve_item(&store.items, &args.id, output)?;

    let comments = timeline_comments(&store.comments, &item.id);
    let mut children: Vec<(f64, String)> = store
        .items
        .iter()
        .filter(|candidate| candidate.parent_id.as_deref() == Some(item.id.as_str()))
        .map(|child| (child.sort_index, child.id.clone()))
        .collect();
    children.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let view = ShowView {
        item,
        comments,
        children: children.into_iter().map(|(_, id)| id).collect(),
    };

    render_mode(output, &view, render_show_text, render_show_pretty)
}
