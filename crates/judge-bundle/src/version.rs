//! Version reconciliation protocol.
//!
//! Decides whether a validated draft becomes a new bundle version:
//!
//! ```text
//! NoExistingBundle                      -> version 1, append
//! HasCurrentBundle(hash == draft hash)  -> no-op, keep current
//! HasCurrentBundle(hash != draft hash)  -> version current+1, append
//! ```
//!
//! The engine only issues the read and the conditional append. The
//! repository is responsible for making the append a compare-and-swap:
//! it must refuse a bundle whose version is not exactly the stored current
//! version plus one, and must insert the versioned row and repoint the
//! problem's current bundle as a single atomic unit.

use crate::error::IngestError;
use crate::model::{Bundle, BundleDraft, ProblemId};
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors reported by a [`BundleRepository`].
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The owning problem does not exist (or was deleted mid-flight).
    #[error("problem {problem_id} does not exist")]
    ProblemNotFound { problem_id: ProblemId },

    /// The conditional append lost a race: current version moved on.
    #[error(
        "version conflict for problem {problem_id}: cannot append version {attempted} on top of {}",
        describe_current(.current)
    )]
    VersionConflict {
        problem_id: ProblemId,
        attempted: u32,
        current: Option<u32>,
    },

    /// Storage backend failure.
    #[error("repository backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

fn describe_current(current: &Option<u32>) -> String {
    match current {
        Some(v) => format!("version {}", v),
        None => "no bundle".to_string(),
    }
}

impl RepositoryError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProblemNotFound { .. })
    }
}

/// Persistence collaborator for versioned bundles.
///
/// # Atomicity
///
/// `append_bundle_version` must only succeed when `bundle.version` equals
/// the stored current version plus one (or 1 when the problem has no
/// bundle), and must apply "insert version row" and "repoint current" as
/// one unit. Concurrent appends of the same version for the same problem
/// must result in exactly one success and one `VersionConflict`.
#[async_trait]
pub trait BundleRepository: Send + Sync {
    /// Current (highest-version) bundle, or `None` for a problem without one.
    ///
    /// Returns `ProblemNotFound` when the problem itself does not exist.
    async fn get_current_bundle(&self, problem_id: ProblemId) -> RepositoryResult<Option<Bundle>>;

    /// Atomically append `bundle` as the problem's new current version.
    async fn append_bundle_version(
        &self,
        problem_id: ProblemId,
        bundle: &Bundle,
    ) -> RepositoryResult<()>;
}

#[async_trait]
impl<R: BundleRepository + ?Sized> BundleRepository for std::sync::Arc<R> {
    async fn get_current_bundle(&self, problem_id: ProblemId) -> RepositoryResult<Option<Bundle>> {
        (**self).get_current_bundle(problem_id).await
    }

    async fn append_bundle_version(
        &self,
        problem_id: ProblemId,
        bundle: &Bundle,
    ) -> RepositoryResult<()> {
        (**self).append_bundle_version(problem_id, bundle).await
    }
}

/// Observed state of a problem's bundle history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionState {
    NoExistingBundle,
    HasCurrentBundle(Bundle),
}

impl VersionState {
    pub fn from_current(current: Option<Bundle>) -> Self {
        match current {
            Some(bundle) => Self::HasCurrentBundle(bundle),
            None => Self::NoExistingBundle,
        }
    }

    /// Version a new, different bundle would receive, or `None` once the
    /// counter is exhausted.
    pub fn next_version(&self) -> Option<u32> {
        match self {
            Self::NoExistingBundle => Some(1),
            Self::HasCurrentBundle(current) => current.version.checked_add(1),
        }
    }
}

/// What an ingestion did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new version was stored.
    Created(Bundle),
    /// The archive is byte-identical to the current bundle; nothing stored.
    Unchanged(Bundle),
}

impl IngestOutcome {
    pub fn bundle(&self) -> &Bundle {
        match self {
            Self::Created(b) | Self::Unchanged(b) => b,
        }
    }

    pub fn into_bundle(self) -> Bundle {
        match self {
            Self::Created(b) | Self::Unchanged(b) => b,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Run the version protocol for `draft` against `repo`.
///
/// Cancellation is honored while reading the current bundle and right
/// before the append is issued. Once issued, the append runs to completion
/// so the reported outcome always matches what the repository stored.
pub async fn reconcile_version<R: BundleRepository + ?Sized>(
    repo: &R,
    problem_id: ProblemId,
    draft: BundleDraft,
    cancel: &CancellationToken,
) -> Result<IngestOutcome, IngestError> {
    let read = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(IngestError::Cancelled),
        current = repo.get_current_bundle(problem_id) => current,
    };
    let current = read.map_err(|e| IngestError::from_repository(problem_id, e))?;

    let state = VersionState::from_current(current);
    if let VersionState::HasCurrentBundle(current) = &state {
        if current.content_hash == draft.content_hash {
            tracing::info!(
                problem_id,
                version = current.version,
                content_hash = %current.content_hash,
                "bundle unchanged; skipping new version"
            );
            return Ok(IngestOutcome::Unchanged(current.clone()));
        }
    }

    let Some(next) = state.next_version() else {
        return Err(IngestError::PersistenceConflict {
            problem_id,
            reason: format!("bundle version counter exhausted at {}", u32::MAX),
        });
    };
    let bundle = draft.into_version(next);
    if cancel.is_cancelled() {
        return Err(IngestError::Cancelled);
    }
    repo.append_bundle_version(problem_id, &bundle)
        .await
        .map_err(|e| IngestError::from_repository(problem_id, e))?;

    tracing::info!(
        problem_id,
        version = bundle.version,
        content_hash = %bundle.content_hash,
        testcases = bundle.testcase_count(),
        "stored new bundle version"
    );
    Ok(IngestOutcome::Created(bundle))
}
