//! Subcommand implementations, one module per `rf` command.

pub mod comment;
pub mod completions;
pub mod create;
pub mod delete;
pub mod init;
pub mod list;
pub mod show;
pub mod sync;
pub mod update;

use crate::output::{CliError, OutputMode, render_error};
use anyhow::Result;
use reef_core::config::find_project_root;
use reef_core::error::ErrorCode;
use reef_core::model::{ResolveError, WorkItem, resolve_id};
use reef_core::workspace::Workspace;
use std::path::Path;
use std::str::FromStr;

/// Locate the enclosing project and open its workspace.
///
/// Renders a coded error before failing so the caller can just `?` it.
pub(crate) fn open_workspace(output: OutputMode, cwd: &Path) -> Result<Workspace> {
    let Some(root) = find_project_root(cwd) else {
        let err = CliError::coded(
            ErrorCode::NotInitialized,
            format!("no .reef project found above {}", cwd.display()),
        );
        render_error(output, &err)?;
        anyhow::bail!("{}", err.message);
    };
    Workspace::open(&root)
}

/// Resolve a partial ID against the store, rendering a coded error on miss.
pub(crate) fn resolve_item(
    items: &[WorkItem],
    wanted: &str,
    output: OutputMode,
) -> Result<WorkItem> {
    match resolve_id(items, wanted) {
        Ok(item) => Ok(item.clone()),
        Err(e) => {
            let code = match e {
                ResolveError::NotFound { .. } => ErrorCode::ItemNotFound,
                ResolveError::Ambiguous { .. } => ErrorCode::AmbiguousId,
            };
            render_error(output, &CliError::coded(code, e.to_string()))?;
            anyhow::bail!("{e}");
        }
    }
}

/// Parse an optional enum-valued flag, rendering a coded error on bad input.
pub(crate) fn parse_flag<T: FromStr>(value: Option<&str>, output: OutputMode) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(None),
        Some(raw) => match raw.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                render_error(
                    output,
                    &CliError::coded(ErrorCode::InvalidEnumValue, e.to_string()),
                )?;
                anyhow::bail!("{e}");
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn open_workspace_fails_outside_a_project() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = open_workspace(OutputMode::Json, dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn open_workspace_walks_up_to_the_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join(".reef")).expect("create .reef");
        let nested = dir.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).expect("create nested");

        let ws = open_workspace(OutputMode::Json, &nested).expect("open");
        assert_eq!(ws.root(), dir.path());
    }

    #[test]
    fn resolve_item_reports_missing_and_ambiguous() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let items = vec![
            WorkItem::new("rf-abc111", "One", now),
            WorkItem::new("rf-abc222", "Two", now),
        ];

        assert!(resolve_item(&items, "zzz", OutputMode::Json).is_err());
        assert!(resolve_item(&items, "abc", OutputMode::Json).is_err());
        let hit = resolve_item(&items, "abc111", OutputMode::Json).expect("unique");
        assert_eq!(hit.id, "rf-abc111");
    }

    #[test]
    fn parse_flag_maps_values_and_rejects_garbage() {
        use reef_core::model::Status;

        let none = parse_flag::<Status>(None, OutputMode::Json).expect("none");
        assert!(none.is_none());
        let parsed = parse_flag::<Status>(Some("in-progress"), OutputMode::Json).expect("parse");
        assert_eq!(parsed, Some(Status::InProgress));
        assert!(parse_flag::<Status>(Some("funky"), OutputMode::Json).is_err());
    }
}
