//! JSONL codec for the canonical snapshot file.
//!
//! One JSON object per line, no wrapping array; a `type` field distinguishes
//! work-item lines from comment lines. Line order never conveys precedence.
//! Decoding is tolerant: unknown fields are ignored for forward
//! compatibility, blank lines are skipped, and a malformed line yields a
//! line-scoped error instead of aborting the whole parse.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Comment, WorkItem};

/// One line of the snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Record {
    Item(WorkItem),
    Comment(Comment),
}

/// Result of a tolerant decode.
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub items: Vec<WorkItem>,
    pub comments: Vec<Comment>,
    /// Malformed lines, in file order. Empty for a clean file.
    pub line_errors: Vec<LineError>,
}

/// A single line that failed to decode. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    pub line: usize,
    pub message: String,
}

/// Errors returned by snapshot encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The snapshot bytes are not valid UTF-8.
    #[error("snapshot is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// A line failed to decode and the caller asked for strict decoding.
    #[error("line {line}: {message}")]
    Line { line: usize, message: String },

    /// A record could not be serialized (non-finite sort index, for one).
    #[error("failed to encode record {id}")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RecordRef<'a> {
    Item(&'a WorkItem),
    Comment(&'a Comment),
}

/// Encode items and comments into canonical snapshot bytes.
///
/// The output is deterministic for a given record set: items first, then
/// comments, each sorted by id, one compact JSON object per line, trailing
/// newline. Two clones holding equal records therefore produce identical
/// bytes regardless of insertion history.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if a record cannot be serialized.
pub fn encode(items: &[WorkItem], comments: &[Comment]) -> Result<Vec<u8>, CodecError> {
    let mut sorted_items: Vec<&WorkItem> = items.iter().collect();
    sorted_items.sort_by(|a, b| a.id.cmp(&b.id));
    let mut sorted_comments: Vec<&Comment> = comments.iter().collect();
    sorted_comments.sort_by(|a, b| a.id.cmp(&b.id));

    let mut out = String::new();
    for item in sorted_items {
        let line =
            serde_json::to_string(&RecordRef::Item(item)).map_err(|source| CodecError::Encode {
                id: item.id.clone(),
                source,
            })?;
        out.push_str(&line);
        out.push('\n');
    }
    for comment in sorted_comments {
        let line = serde_json::to_string(&RecordRef::Comment(comment)).map_err(|source| {
            CodecError::Encode {
                id: comment.id.clone(),
                source,
            }
        })?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out.into_bytes())
}

/// Decode snapshot bytes, collecting per-line errors instead of failing.
///
/// Blank and whitespace-only lines are skipped. A line that is malformed
/// JSON, or whose `type` is unknown, lands in [`Decoded::line_errors`] and
/// decoding continues. When one id appears on several lines the last
/// occurrence wins. Decoded records come back sorted by id.
///
/// # Errors
///
/// Returns [`CodecError::Utf8`] if the bytes are not UTF-8. Per-line
/// failures are reported through [`Decoded::line_errors`], not as an `Err`.
pub fn decode(bytes: &[u8]) -> Result<Decoded, CodecError> {
    let text = std::str::from_utf8(bytes)?;

    let mut items: BTreeMap<String, WorkItem> = BTreeMap::new();
    let mut comments: BTreeMap<String, Comment> = BTreeMap::new();
    let mut line_errors = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(line) {
            Ok(Record::Item(item)) => {
                items.insert(item.id.clone(), item);
            }
            Ok(Record::Comment(comment)) => {
                comments.insert(comment.id.clone(), comment);
            }
            Err(err) => line_errors.push(LineError {
                line: idx + 1,
                message: err.to_string(),
            }),
        }
    }

    Ok(Decoded {
        items: items.into_values().collect(),
        comments: comments.into_values().collect(),
        line_errors,
    })
}

/// Decode snapshot bytes, treating any malformed line as fatal.
///
/// The sync path uses this on both the local file and the fetched remote
/// snapshot: skipping a bad line and then publishing the result would erase
/// the skipped record from every clone.
///
/// # Errors
///
/// Returns [`CodecError::Utf8`] for non-UTF-8 input and [`CodecError::Line`]
/// for the first malformed line.
pub fn decode_strict(bytes: &[u8]) -> Result<Decoded, CodecError> {
    let decoded = decode(bytes)?;
    if let Some(first) = decoded.line_errors.first() {
        return Err(CodecError::Line {
            line: first.line,
            message: first.message.clone(),
        });
    }
    Ok(decoded)
}
