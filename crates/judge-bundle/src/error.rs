//! Ingestion error taxonomy.
//!
//! Every failure aborts the whole ingestion. Each error carries a stable
//! [`ErrorCode`] and an [`ErrorClass`] so callers can map it to a response
//! without string matching.

use crate::model::ProblemId;
use crate::naming::TestcaseKind;
use crate::version::RepositoryError;
use serde::Serialize;

/// Error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorClass {
    /// Archive content violates the bundle contract (names, groups, ordering).
    Contract,
    /// Archive bytes are corrupt or in the wrong container format.
    Integrity,
    /// Entry tries to escape the flat layout or is not a plain file.
    Security,
    /// Resource limit exceeded (DoS prevention).
    Limits,
    /// The repository rejected or failed the version transition.
    Persistence,
    /// Local fault or caller cancellation unrelated to the upload.
    Operational,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Stable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    EmptyBundle,
    UnsupportedFormat,
    MalformedArchive,
    UnsupportedEntry,
    InvalidFilename,
    UnknownGroup,
    DuplicateTestcaseFile,
    IncompleteTestcasePair,
    NonContiguousOrdering,
    LimitExceeded,
    PersistenceConflict,
    Persistence,
    Scratch,
    Cancelled,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Why an entry was rejected as unsupported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRejection {
    /// Symlink, hard link, device, fifo, sparse file, ...
    NotRegular { entry_type: String },
    /// Normalized path still contains a separator.
    NestedPath,
}

impl std::fmt::Display for EntryRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotRegular { entry_type } => write!(f, "{} is not a regular file", entry_type),
            Self::NestedPath => f.write_str("bundle must not contain directories"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("bundle has no testcases")]
    EmptyBundle,

    #[error("unsupported bundle format: {detected}")]
    UnsupportedFormat { detected: &'static str },

    #[error("invalid tar.gz bundle: {context}")]
    MalformedArchive {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported bundle entry '{name}': {reason}")]
    UnsupportedEntry { name: String, reason: EntryRejection },

    #[error("invalid testcase filename: {name}")]
    InvalidFilename { name: String },

    #[error("testcase group {group} does not exist ({declared} declared, entry '{name}')")]
    UnknownGroup {
        name: String,
        group: usize,
        declared: usize,
    },

    #[error("duplicate testcase {kind}: {name}")]
    DuplicateTestcaseFile {
        name: String,
        group: usize,
        order: u32,
        kind: TestcaseKind,
    },

    #[error(
        "testcase {group}_{order} must have both .in and .out files (missing .{})",
        .missing.extension()
    )]
    IncompleteTestcasePair {
        group: usize,
        order: u32,
        missing: TestcaseKind,
    },

    #[error("testcase order must be consecutive in group {group} (expected {expected}, found {found})")]
    NonContiguousOrdering {
        group: usize,
        expected: u32,
        found: u32,
    },

    #[error("{limit}: exceeded limit of {max}")]
    LimitExceeded { limit: &'static str, max: u64 },

    #[error("persistence conflict for problem {problem_id}: {reason}")]
    PersistenceConflict {
        problem_id: ProblemId,
        reason: String,
    },

    #[error("persistence failed for problem {problem_id}")]
    Persistence {
        problem_id: ProblemId,
        #[source]
        source: RepositoryError,
    },

    #[error("scratch extraction failed: {context}")]
    Scratch {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ingestion cancelled")]
    Cancelled,
}

impl IngestError {
    pub fn malformed(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::MalformedArchive {
            context: context.into(),
            source,
        }
    }

    pub fn scratch(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Scratch {
            context: context.into(),
            source,
        }
    }

    /// Map a repository failure for `problem_id` onto the taxonomy.
    pub fn from_repository(problem_id: ProblemId, err: RepositoryError) -> Self {
        match err {
            RepositoryError::ProblemNotFound { .. } | RepositoryError::VersionConflict { .. } => {
                Self::PersistenceConflict {
                    problem_id,
                    reason: err.to_string(),
                }
            }
            RepositoryError::Backend(_) => Self::Persistence {
                problem_id,
                source: err,
            },
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyBundle => ErrorCode::EmptyBundle,
            Self::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            Self::MalformedArchive { .. } => ErrorCode::MalformedArchive,
            Self::UnsupportedEntry { .. } => ErrorCode::UnsupportedEntry,
            Self::InvalidFilename { .. } => ErrorCode::InvalidFilename,
            Self::UnknownGroup { .. } => ErrorCode::UnknownGroup,
            Self::DuplicateTestcaseFile { .. } => ErrorCode::DuplicateTestcaseFile,
            Self::IncompleteTestcasePair { .. } => ErrorCode::IncompleteTestcasePair,
            Self::NonContiguousOrdering { .. } => ErrorCode::NonContiguousOrdering,
            Self::LimitExceeded { .. } => ErrorCode::LimitExceeded,
            Self::PersistenceConflict { .. } => ErrorCode::PersistenceConflict,
            Self::Persistence { .. } => ErrorCode::Persistence,
            Self::Scratch { .. } => ErrorCode::Scratch,
            Self::Cancelled => ErrorCode::Cancelled,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::EmptyBundle
            | Self::InvalidFilename { .. }
            | Self::UnknownGroup { .. }
            | Self::DuplicateTestcaseFile { .. }
            | Self::IncompleteTestcasePair { .. }
            | Self::NonContiguousOrdering { .. } => ErrorClass::Contract,
            Self::UnsupportedFormat { .. } | Self::MalformedArchive { .. } => ErrorClass::Integrity,
            Self::UnsupportedEntry { .. } => ErrorClass::Security,
            Self::LimitExceeded { .. } => ErrorClass::Limits,
            Self::PersistenceConflict { .. } | Self::Persistence { .. } => ErrorClass::Persistence,
            Self::Scratch { .. } | Self::Cancelled => ErrorClass::Operational,
        }
    }

    /// True when the uploader can fix the problem by sending a different archive.
    pub fn is_client_correctable(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Contract | ErrorClass::Integrity | ErrorClass::Security | ErrorClass::Limits
        )
    }
}
