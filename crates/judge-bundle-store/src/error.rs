use judge_bundle::{ProblemId, RepositoryError};
use thiserror::Error;

/// Errors from the SQLite bundle store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("problem {problem_id} does not exist")]
    ProblemNotFound { problem_id: ProblemId },

    #[error(
        "version conflict for problem {problem_id}: attempted {attempted}, current {current:?}"
    )]
    VersionConflict {
        problem_id: ProblemId,
        attempted: u32,
        current: Option<u32>,
    },

    #[error("corrupt bundle row for problem {problem_id} version {version}: {reason}")]
    Corrupt {
        problem_id: ProblemId,
        version: u32,
        reason: String,
    },

    #[error("store connection lock poisoned")]
    Poisoned,

    #[error("blocking store task failed: {0}")]
    Task(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProblemNotFound { .. })
    }
}

impl From<StoreError> for RepositoryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ProblemNotFound { problem_id } => {
                RepositoryError::ProblemNotFound { problem_id }
            }
            StoreError::VersionConflict {
                problem_id,
                attempted,
                current,
            } => RepositoryError::VersionConflict {
                problem_id,
                attempted,
                current,
            },
            other => RepositoryError::Backend(anyhow::Error::new(other)),
        }
    }
}
