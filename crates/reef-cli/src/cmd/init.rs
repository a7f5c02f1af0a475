//! `rf init` — create the `.reef/` project skeleton.

use crate::output::{OutputMode, render};
use anyhow::{Context as _, Result};
use clap::Args;
use reef_core::config;
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Re-run initialization even if `.reef/` already exists. Existing
    /// config and data files are kept; only missing pieces are created.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = "cache.db\ncache.db-wal\ncache.db-shm\nreef.lock\n*.tmp\n";

/// Outcome of `rf init`, also the JSON payload.
#[derive(Debug, Serialize)]
struct InitReport {
    initialized: bool,
    root: String,
    config: String,
    snapshot: String,
}

/// Execute `rf init`. Creates the project skeleton:
///
/// ```text
/// .reef/
///   config.toml     (default [sync] section)
///   .gitignore      (cache.db, reef.lock, temp files)
/// ```
///
/// The snapshot file itself is created lazily by the first write.
///
/// # Errors
///
/// Returns an error if `.reef/` already exists and `--force` is not set,
/// or if any filesystem operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let reef_dir = project_root.join(config::REEF_DIR);

    if reef_dir.exists() && !args.force {
        anyhow::bail!(".reef/ already exists. Use `rf init --force` to reinitialize.");
    }

    // Sync travels through a git ref, so warn early when there is no repo.
    if !project_root.join(".git").exists() {
        eprintln!("Note: no git repository detected. `rf sync` needs one;");
        eprintln!("      run `git init` (and add a remote) before your first sync.");
        eprintln!();
    }

    std::fs::create_dir_all(&reef_dir)
        .with_context(|| format!("Failed to create {}", reef_dir.display()))?;

    let config_path = config::write_default_config(&reef_dir)?;

    let gitignore_path = reef_dir.join(".gitignore");
    if !gitignore_path.exists() {
        std::fs::write(&gitignore_path, GITIGNORE)
            .with_context(|| format!("Failed to write {}", gitignore_path.display()))?;
    }

    let cfg = config::load_config(project_root)?;
    let report = InitReport {
        initialized: true,
        root: project_root.display().to_string(),
        config: config_path.display().to_string(),
        snapshot: cfg.sync.file.clone(),
    };

    render(output, &report, |r, w| {
        writeln!(w, "Initialized .reef/ at {}", r.root)?;
        writeln!(w)?;
        writeln!(w, "  Config:   {}", r.config)?;
        writeln!(w, "  Snapshot: {} (created on first write)", r.snapshot)?;
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  rf create \"My first item\"")?;
        writeln!(w, "  rf sync   # exchange snapshots through the git ref")?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_args(force: bool) -> InitArgs {
        InitArgs { force }
    }

    #[test]
    fn fresh_init_creates_structure() {
        let dir = tempfile::tempdir().expect("tempdir");
        run_init(&init_args(false), OutputMode::Text, dir.path()).expect("init");

        assert!(dir.path().join(".reef").is_dir());
        assert!(dir.path().join(".reef/config.toml").is_file());
        assert!(dir.path().join(".reef/.gitignore").is_file());
    }

    #[test]
    fn reinit_without_force_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        run_init(&init_args(false), OutputMode::Text, dir.path()).expect("first init");

        let err = run_init(&init_args(false), OutputMode::Text, dir.path()).unwrap_err();
        assert!(err.to_string().contains("--force"));
    }

    #[test]
    fn reinit_with_force_keeps_edited_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        run_init(&init_args(false), OutputMode::Text, dir.path()).expect("first init");

        let config_path = dir.path().join(".reef/config.toml");
        std::fs::write(&config_path, "[sync]\nremote = \"upstream\"\n").expect("edit config");

        run_init(&init_args(true), OutputMode::Text, dir.path()).expect("reinit --force");
        let content = std::fs::read_to_string(&config_path).expect("read config");
        assert!(content.contains("upstream"), "config was clobbered");
    }

    #[test]
    fn config_template_parses_with_expected_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        run_init(&init_args(false), OutputMode::Text, dir.path()).expect("init");

        let cfg = config::load_config(dir.path()).expect("load config");
        assert_eq!(cfg.sync.remote, "origin");
        assert_eq!(cfg.sync.ref_name, "refs/reef/data");
        assert_eq!(cfg.sync.file, ".reef/issues.jsonl");
    }

    #[test]
    fn gitignore_covers_derived_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        run_init(&init_args(false), OutputMode::Text, dir.path()).expect("init");

        let content =
            std::fs::read_to_string(dir.path().join(".reef/.gitignore")).expect("read .gitignore");
        assert!(content.contains("cache.db"), "must ignore cache.db");
        assert!(content.contains("reef.lock"), "must ignore reef.lock");
        assert!(content.contains("*.tmp"), "must ignore temp files");
    }
}
