//! `rf comment` — attach a comment to a work item.
//!
//! Comments are append-only records: they merge as a set keyed by id, so
//! adding one never conflicts with edits to the item itself.

use crate::author;
use crate::cmd::{open_workspace, resolve_item};
use crate::output::{CliError, OutputMode, render, render_error};
use anyhow::Result;
use chrono::Utc;
use clap::Args;
use reef_core::id;
use reef_core::model::Comment;
use std::path::Path;

#[derive(Args, Debug)]
pub struct CommentArgs {
    /// Item ID to comment on (supports partial IDs).
    pub id: String,

    /// Comment text.
    pub text: String,
}

/// Comments always carry an author; there is no anonymous fallback.
fn require_author(resolved: Option<String>, output: OutputMode) -> Result<String> {
    match resolved {
        Some(author) => Ok(author),
        None => {
            let err = CliError::new("an author is required for comments")
                .with_hint("pass --author or set REEF_AUTHOR");
            render_error(output, &err)?;
            anyhow::bail!("{}", err.message);
        }
    }
}

/// Execute `rf comment <id> <text>`.
///
/// # Errors
///
/// Returns an error if no author can be resolved, the ID does not resolve
/// to exactly one item, or the store cannot be written.
pub fn run_comment(
    args: &CommentArgs,
    author_flag: Option<&str>,
    output: OutputMode,
    cwd: &Path,
) -> Result<()> {
    let author = require_author(author::resolve_author(author_flag), output)?;
    let ws = open_workspace(output, cwd)?;
    let now = Utc::now();

    let created = ws.mutate(|store| {
        let item = resolve_item(&store.items, &args.id, output)?;

        let comment_id = id::mint_comment_id(&item.id, &author, now, |candidate| {
            store.comments.iter().any(|c| c.id == candidate)
        });
        let comment = Comment::new(comment_id, &item.id, &author, &args.text, now);
        store.comments.push(comment.clone());
        Ok(comment)
    })?;

    tracing::debug!(id = %created.id, item = %created.item_id, "added comment");
    crate::cmd::sync::auto_sync_if_enabled(ws.root(), &ws.config);

    render(output, &created, |comment, w| {
        writeln!(w, "Added comment to {}", comment.item_id)?;
        writeln!(
            w,
            "  {}  {}: {}",
            comment.id, comment.author, comment.text
        )?;
        Ok(())
    })
}
