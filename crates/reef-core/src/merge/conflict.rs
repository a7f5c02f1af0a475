//! Field-level conflict reporting.
//!
//! These types live at the reporting boundary only. The merge engine
//! resolves every divergence to a concrete record; this module carries the
//! explanation of what was chosen and why, for rendering and for `--json`
//! output. [`ConflictValue`] is a narrow tagged union over the field shapes
//! that actually occur in records. Core record types never depend on it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// How a both-sided divergence was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    SameTimestamp,
    DifferentTimestamp,
}

impl ConflictKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SameTimestamp => "same-timestamp",
            Self::DifferentTimestamp => "different-timestamp",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side supplied the winning value for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChosenSource {
    Local,
    Remote,
    /// Neither side alone: the chosen value combines both (tag unions).
    Merged,
}

impl ChosenSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Merged => "merged",
        }
    }
}

impl fmt::Display for ChosenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field value as it appears in a conflict report.
///
/// Serializes untagged, so a report reads like the record itself: strings
/// stay strings, numbers stay numbers, absent values become `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConflictValue {
    Null,
    Text(String),
    Number(f64),
    Timestamp(DateTime<Utc>),
    List(Vec<String>),
}

impl ConflictValue {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(Self::Null, |v| Self::Text(v.to_string()))
    }

    #[must_use]
    pub const fn number(value: f64) -> Self {
        Self::Number(value)
    }

    #[must_use]
    pub const fn timestamp(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }

    #[must_use]
    pub fn list(values: &[String]) -> Self {
        Self::List(values.to_vec())
    }
}

/// One field's divergence and its resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictFieldDetail {
    pub field: String,
    pub local: ConflictValue,
    pub remote: ConflictValue,
    pub chosen: ConflictValue,
    pub chosen_source: ChosenSource,
    pub reason: String,
}

/// Everything recorded about one conflicting record pair.
///
/// For comments, which carry no last-modified timestamp, the two
/// `*_updated_at` fields hold the creation timestamps instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDetail {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    pub fields: Vec<ConflictFieldDetail>,
    pub local_updated_at: DateTime<Utc>,
    pub remote_updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::{ChosenSource, ConflictDetail, ConflictKind, ConflictValue};
    use chrono::{TimeZone, Utc};

    #[test]
    fn values_serialize_untagged() {
        assert_eq!(serde_json::to_string(&ConflictValue::Null).unwrap(), "null");
        assert_eq!(
            serde_json::to_string(&ConflictValue::text("hi")).unwrap(),
            "\"hi\""
        );
        assert_eq!(
            serde_json::to_string(&ConflictValue::number(1.5)).unwrap(),
            "1.5"
        );
        assert_eq!(
            serde_json::to_string(&ConflictValue::list(&["a".to_string(), "b".to_string()]))
                .unwrap(),
            "[\"a\",\"b\"]"
        );
    }

    #[test]
    fn opt_text_maps_none_to_null() {
        assert_eq!(ConflictValue::opt_text(None), ConflictValue::Null);
        assert_eq!(
            ConflictValue::opt_text(Some("x")),
            ConflictValue::Text("x".to_string())
        );
    }

    #[test]
    fn kind_and_source_wire_forms() {
        assert_eq!(
            serde_json::to_string(&ConflictKind::SameTimestamp).unwrap(),
            "\"same-timestamp\""
        );
        assert_eq!(
            serde_json::to_string(&ChosenSource::Remote).unwrap(),
            "\"remote\""
        );
        assert_eq!(ConflictKind::DifferentTimestamp.to_string(), "different-timestamp");
        assert_eq!(ChosenSource::Merged.to_string(), "merged");
    }

    #[test]
    fn detail_wire_form_uses_camel_case_and_type_key() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let detail = ConflictDetail {
            id: "rf-a1b2c3".to_string(),
            kind: ConflictKind::SameTimestamp,
            fields: Vec::new(),
            local_updated_at: at,
            remote_updated_at: at,
        };
        let encoded = serde_json::to_string(&detail).unwrap();
        assert!(encoded.contains("\"type\":\"same-timestamp\""));
        assert!(encoded.contains("\"localUpdatedAt\""));
        assert!(encoded.contains("\"remoteUpdatedAt\""));
    }
}
