use std::fmt;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    NotAGitRepository,
    ItemNotFound,
    AmbiguousId,
    InvalidEnumValue,
    CorruptRecord,
    CorruptCache,
    RemoteMissing,
    PublishContention,
    SyncRetriesExhausted,
    PushFailed,
    SnapshotWriteFailed,
    LockContention,
    SnapshotReadFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::NotAGitRepository => "E1003",
            Self::ItemNotFound => "E2001",
            Self::AmbiguousId => "E2004",
            Self::InvalidEnumValue => "E2005",
            Self::CorruptRecord => "E3001",
            Self::CorruptCache => "E3003",
            Self::RemoteMissing => "E4001",
            Self::PublishContention => "E4002",
            Self::SyncRetriesExhausted => "E4003",
            Self::PushFailed => "E4004",
            Self::SnapshotWriteFailed => "E5001",
            Self::LockContention => "E5002",
            Self::SnapshotReadFailed => "E5003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::NotAGitRepository => "Not a git repository",
            Self::ItemNotFound => "Item not found",
            Self::AmbiguousId => "Ambiguous item ID",
            Self::InvalidEnumValue => "Invalid status/priority value",
            Self::CorruptRecord => "Malformed snapshot record",
            Self::CorruptCache => "Corrupt SQLite cache",
            Self::RemoteMissing => "Remote not configured",
            Self::PublishContention => "Publish rejected by remote",
            Self::SyncRetriesExhausted => "Sync retries exhausted",
            Self::PushFailed => "Push failed",
            Self::SnapshotWriteFailed => "Snapshot file write failed",
            Self::LockContention => "Lock contention",
            Self::SnapshotReadFailed => "Snapshot file read failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `rf init` to initialize this repository."),
            Self::ConfigParseError => Some("Fix syntax in .reef/config.toml and retry."),
            Self::NotAGitRepository => Some("Run `git init` first; sync travels through a git ref."),
            Self::ItemNotFound => None,
            Self::AmbiguousId => Some("Use a longer ID prefix to disambiguate."),
            Self::InvalidEnumValue => Some("Use one of the documented status/priority values."),
            Self::CorruptRecord => {
                Some("Fix or remove the malformed line in the snapshot file, then retry.")
            }
            Self::CorruptCache => Some("Delete .reef/cache.db; it is rebuilt on the next read."),
            Self::RemoteMissing => Some("Add a git remote or pass --remote with a URL."),
            Self::PublishContention => {
                Some("Another writer published first. Re-run `rf sync` to converge.")
            }
            Self::SyncRetriesExhausted => {
                Some("The remote is being updated rapidly. Wait briefly and re-run `rf sync`.")
            }
            Self::PushFailed => Some("Check remote permissions and connectivity, then retry."),
            Self::SnapshotWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Retry after the other `rf` process releases its lock."),
            Self::SnapshotReadFailed => Some("Check permissions on the snapshot file."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::NotAGitRepository,
            ErrorCode::ItemNotFound,
            ErrorCode::AmbiguousId,
            ErrorCode::InvalidEnumValue,
            ErrorCode::CorruptRecord,
            ErrorCode::CorruptCache,
            ErrorCode::RemoteMissing,
            ErrorCode::PublishContention,
            ErrorCode::SyncRetriesExhausted,
            ErrorCode::PushFailed,
            ErrorCode::SnapshotWriteFailed,
            ErrorCode::LockContention,
            ErrorCode::SnapshotReadFailed,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::PublishContention.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn every_code_has_a_message() {
        for code in [
            ErrorCode::NotInitialized,
            ErrorCode::RemoteMissing,
            ErrorCode::SyncRetriesExhausted,
        ] {
            assert!(!code.message().is_empty());
        }
    }
}
