use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Linkage to a comment in an external tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCommentLink {
    pub comment_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A comment attached to a work item.
///
/// Comments are append-mostly and carry no last-modified timestamp, so the
/// merge engine resolves a divergent pair by content, not by recency. `refs`
/// is an ordered list of free-text references; order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub item_id: String,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalCommentLink>,
}

impl Comment {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        item_id: impl Into<String>,
        author: impl Into<String>,
        text: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            item_id: item_id.into(),
            author: author.into(),
            text: text.into(),
            created_at: now,
            refs: Vec::new(),
            external: None,
        }
    }
}
