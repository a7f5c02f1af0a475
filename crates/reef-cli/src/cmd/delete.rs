//! `rf delete` — soft-delete work items.
//!
//! Sets status to `deleted` and stamps who and why. Tombstoned items stay
//! in the snapshot so the deletion wins merges against concurrent edits.

use crate::author;
use crate::cmd::open_workspace;
use crate::output::{OutputMode, render};
use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use reef_core::model::{Status, WorkItem, resolve_id};
use reef_core::workspace::LoadedStore;
use serde::Serialize;
use std::io::{IsTerminal, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Item ID to delete (supports partial IDs).
    pub id: String,

    /// Additional item IDs to delete in the same command.
    #[arg(value_name = "ID")]
    pub ids: Vec<String>,

    /// Reason recorded on the tombstone.
    #[arg(long)]
    pub reason: Option<String>,

    /// Skip the interactive confirmation prompt.
    #[arg(long)]
    pub force: bool,
}

fn confirm_delete(id: &str, title: &str) -> std::io::Result<bool> {
    if !std::io::stdin().is_terminal() || !std::io::stdout().is_terminal() {
        return Ok(true);
    }

    eprint!("Delete {id} '{title}'? [y/N] ");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let answer = input.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

#[derive(Debug, Serialize)]
struct DeleteResult {
    id: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeleteBatchOutput {
    results: Vec<DeleteResult>,
}

fn item_ids(args: &DeleteArgs) -> impl Iterator<Item = &str> {
    std::iter::once(args.id.as_str()).chain(args.ids.iter().map(String::as_str))
}

/// Resolve one raw ID and ask for confirmation. Returns the canonical ID
/// to delete, or a row-level error message.
fn plan_delete(items: &[WorkItem], raw_id: &str, force: bool) -> Result<String, String> {
    let item = resolve_id(items, raw_id).map_err(|e| e.to_string())?;
    if item.is_deleted() {
        return Err(format!("item '{}' is already deleted", item.id));
    }
    if !force {
        match confirm_delete(&item.id, &item.title) {
            Ok(true) => {}
            Ok(false) => return Err(format!("deletion of '{}' cancelled", item.id)),
            Err(e) => return Err(e.to_string()),
        }
    }
    Ok(item.id.clone())
}

fn apply_deletes(
    store: &mut LoadedStore,
    plan: &[(String, Result<String, String>)],
    deleted_by: Option<&str>,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<DeleteResult> {
    let mut rows = Vec::with_capacity(plan.len());
    for (raw_id, outcome) in plan {
        match outcome {
            Err(msg) => rows.push(DeleteResult {
                id: raw_id.clone(),
                ok: false,
                error: Some(msg.clone()),
            }),
            Ok(resolved) => match store.items.iter_mut().find(|item| item.id == *resolved) {
                None => rows.push(DeleteResult {
                    id: resolved.clone(),
                    ok: false,
                    error: Some(format!("item '{resolved}' not found")),
                }),
                Some(item) if item.is_deleted() => rows.push(DeleteResult {
                    id: resolved.clone(),
                    ok: false,
                    error: Some(format!("item '{resolved}' is already deleted")),
                }),
                Some(item) => {
                    item.status = Status::Deleted;
                    item.deleted_by = deleted_by.map(str::to_string);
                    item.delete_reason = reason.map(str::to_string);
                    item.touch(now);
                    rows.push(DeleteResult {
                        id: resolved.clone(),
                        ok: true,
                        error: None,
                    });
                }
            },
        }
    }
    rows
}

/// Execute `rf delete <id> [id...]`.
///
/// # Errors
///
/// Returns an error if any item in the batch could not be deleted. Items
/// that did delete stay deleted even when others in the batch fail.
pub fn run_delete(
    args: &DeleteArgs,
    author_flag: Option<&str>,
    output: OutputMode,
    cwd: &Path,
) -> Result<()> {
    let ws = open_workspace(output, cwd)?;
    let deleted_by = author::resolve_author(author_flag);
    let now = Utc::now();

    // Resolve and confirm against a plain load so the prompt never holds
    // the store lock. The mutate below re-checks under the lock.
    let store = ws.load()?;
    let plan: Vec<(String, Result<String, String>)> = item_ids(args)
        .map(|raw_id| (raw_id.to_string(), plan_delete(&store.items, raw_id, args.force)))
        .collect();

    let any_confirmed = plan.iter().any(|(_, outcome)| outcome.is_ok());
    let results = if any_confirmed {
        ws.mutate(|store| {
            Ok(apply_deletes(
                store,
                &plan,
                deleted_by.as_deref(),
                args.reason.as_deref(),
                now,
            ))
        })?
    } else {
        plan.into_iter()
            .map(|(raw_id, outcome)| DeleteResult {
                id: raw_id,
                ok: false,
                error: outcome.err(),
            })
            .collect()
    };

    let deleted = results.iter().filter(|r| r.ok).count();
    tracing::debug!(deleted, total = results.len(), "delete batch finished");
    if deleted > 0 {
        crate::cmd::sync::auto_sync_if_enabled(ws.root(), &ws.config);
    }

    let payload = DeleteBatchOutput { results };
    let failures: Vec<String> = payload
        .results
        .iter()
        .filter(|r| !r.ok)
        .map(|r| r.error.clone().unwrap_or_else(|| "unknown error".to_string()))
        .collect();

    render(output, &payload, |r, w| {
        writeln!(w, "Delete results")?;
        writeln!(w, "{:-<72}", "")?;
        writeln!(w, "{:<4}  {:<16}  RESULT", "OK", "ID")?;
        writeln!(w, "{:-<72}", "")?;
        for result in &r.results {
            if result.ok {
                writeln!(w, "ok    {:<16}  deleted", result.id)?;
            } else {
                writeln!(
                    w,
                    "err   {:<16}  {}",
                    result.id,
                    result.error.as_deref().unwrap_or("unknown error")
                )?;
            }
        }
        Ok(())
    })?;

    if failures.is_empty() {
        Ok(())
    } else if failures.len() == 1 {
        anyhow::bail!("{}", failures[0]);
    } else {
        anyhow::bail!("{} item(s) failed", failures.len());
    }
}
