//! `rf sync` — fetch, merge, and publish the snapshot through the data ref.
//!
//! Works in a fresh clone before `rf init`: the first sync materializes
//! `.reef/` and the snapshot from whatever the remote ref holds.

use crate::output::{CliError, OutputMode, render, render_error};
use anyhow::Result;
use clap::Args;
use reef_core::config::{self, ReefConfig, SyncConfig};
use reef_core::git::GitTarget;
use reef_core::sync::auto::AutoSync;
use reef_core::sync::{SyncOptions, SyncResult};
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Merge and report, but write nothing and push nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip publishing to the remote after the local write.
    #[arg(long)]
    pub no_push: bool,

    /// Remote to sync with (overrides config).
    #[arg(long)]
    pub remote: Option<String>,

    /// Git ref to sync through (overrides config).
    #[arg(long = "ref", value_name = "REF")]
    pub ref_name: Option<String>,

    /// Suppress success output; errors still print.
    #[arg(long)]
    pub silent: bool,

    /// Publish retry budget under contention (overrides config).
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,
}

/// Config defaults with CLI flag overrides applied on top.
fn build_options(config: &SyncConfig, args: &SyncArgs) -> SyncOptions {
    let mut opts = SyncOptions::from_config(config);
    if args.remote.is_some() || args.ref_name.is_some() {
        let remote = args.remote.as_deref().unwrap_or(&config.remote);
        let ref_name = args.ref_name.as_deref().unwrap_or(&config.ref_name);
        opts.target = GitTarget::new(remote, ref_name);
    }
    opts.push = opts.push && !args.no_push;
    opts.dry_run = args.dry_run;
    opts.silent = args.silent;
    if let Some(retries) = args.retries {
        opts.max_retries = retries;
    }
    opts
}

fn render_summary(result: &SyncResult, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "rf sync")?;
    writeln!(
        w,
        "  items:    {} added, {} updated, {} unchanged",
        result.items_added, result.items_updated, result.items_unchanged
    )?;
    writeln!(
        w,
        "  comments: {} added, {} unchanged",
        result.comments_added, result.comments_unchanged
    )?;
    if !result.conflicts.is_empty() {
        writeln!(w, "  conflicts resolved:")?;
        for conflict in &result.conflicts {
            writeln!(w, "    {conflict}")?;
        }
    }
    if result.dry_run {
        writeln!(w, "  dry run: nothing written")?;
    } else if result.pushed {
        writeln!(w, "  pushed")?;
    } else {
        writeln!(w, "  push skipped")?;
    }
    Ok(())
}

/// Execute `rf sync`.
///
/// # Errors
///
/// Returns an error when the repo cannot be opened, the remote or ref is
/// missing, or publish contention outlives the retry budget. The rendered
/// error carries the matching `E####` code.
pub fn run_sync(args: &SyncArgs, output: OutputMode, cwd: &Path) -> Result<()> {
    // No .reef yet is fine here; syncing into a fresh clone bootstraps it.
    let root = config::find_project_root(cwd).unwrap_or_else(|| cwd.to_path_buf());
    let cfg = config::load_config(&root)?;
    let opts = build_options(&cfg.sync, args);

    match reef_core::sync::run_sync(&root, &opts) {
        Ok(result) => {
            if args.silent {
                return Ok(());
            }
            render(output, &result, render_summary)
        }
        Err(e) => {
            let err = CliError::coded(e.error_code(), e.to_string());
            render_error(output, &err)?;
            anyhow::bail!("{}", err.message);
        }
    }
}

/// Kick a quiet sync after a local mutation when `sync.auto` is on.
///
/// Runs through the debounce worker; shutdown flushes the pending run, so a
/// one-shot command still publishes exactly once before returning. Failures
/// are logged and swallowed: the local write already landed and the next
/// explicit `rf sync` picks it up.
pub fn auto_sync_if_enabled(root: &Path, config: &ReefConfig) {
    if !config.sync.auto {
        return;
    }

    let mut opts = SyncOptions::from_config(&config.sync);
    opts.silent = true;

    let runner_root = root.to_path_buf();
    let auto = AutoSync::spawn(Duration::from_millis(config.sync.debounce_ms), move || {
        if let Err(error) = reef_core::sync::run_sync(&runner_root, &opts) {
            tracing::warn!("auto-sync failed (run `rf sync` to retry): {error}");
        }
    });
    auto.trigger();
    auto.shutdown();
}
