//! Record types for the snapshot: work items, comments, and the display tree.

pub mod comment;
pub mod hierarchy;
pub mod item;

pub use comment::{Comment, ExternalCommentLink};
pub use hierarchy::Hierarchy;
pub use item::{ExternalLink, ParseEnumError, Priority, Status, WorkItem};

use std::fmt;

use crate::id::ID_PREFIX;

/// Error returned when an id (or id fragment) does not resolve to exactly
/// one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    NotFound { wanted: String },
    Ambiguous { wanted: String, matches: Vec<String> },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { wanted } => write!(f, "no item found matching '{wanted}'"),
            Self::Ambiguous { wanted, matches } => {
                write!(
                    f,
                    "ambiguous id '{wanted}': matches {} items ({})",
                    matches.len(),
                    matches.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Resolve a possibly-partial id to a single item.
///
/// Tries an exact match first, then an exact match with the `rf-` prefix
/// prepended, then unique-prefix matches of both forms.
///
/// # Errors
///
/// Returns [`ResolveError::NotFound`] when nothing matches and
/// [`ResolveError::Ambiguous`] when a fragment matches several items.
pub fn resolve_id<'a>(items: &'a [WorkItem], wanted: &str) -> Result<&'a WorkItem, ResolveError> {
    if let Some(found) = items.iter().find(|item| item.id == wanted) {
        return Ok(found);
    }

    let prefixed = format!("{ID_PREFIX}-{wanted}");
    if let Some(found) = items.iter().find(|item| item.id == prefixed) {
        return Ok(found);
    }

    let mut matches: Vec<&WorkItem> = items
        .iter()
        .filter(|item| item.id.starts_with(wanted))
        .collect();
    if matches.is_empty() {
        matches = items
            .iter()
            .filter(|item| item.id.starts_with(&prefixed))
            .collect();
    }

    match matches.len() {
        0 => Err(ResolveError::NotFound {
            wanted: wanted.to_string(),
        }),
        1 => Ok(matches[0]),
        _ => Err(ResolveError::Ambiguous {
            wanted: wanted.to_string(),
            matches: matches.iter().map(|item| item.id.clone()).collect(),
        }),
    }
}
