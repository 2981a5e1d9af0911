//! In-memory bundle repository (for testing and embedding).

use crate::model::{Bundle, ProblemId};
use crate::version::{BundleRepository, RepositoryError, RepositoryResult};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Bundle histories keyed by problem, guarded by a single async mutex.
///
/// The lock is held across the whole check-then-append, which makes
/// `append_bundle_version` a compare-and-swap per problem.
#[derive(Debug, Default)]
pub struct InMemoryBundleRepository {
    problems: Mutex<HashMap<ProblemId, Vec<Bundle>>>,
}

impl InMemoryBundleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `problem_id` known, with no bundle. Idempotent.
    pub async fn register_problem(&self, problem_id: ProblemId) {
        self.problems
            .lock()
            .await
            .entry(problem_id)
            .or_default();
    }

    /// Forget a problem and its history.
    pub async fn remove_problem(&self, problem_id: ProblemId) -> bool {
        self.problems.lock().await.remove(&problem_id).is_some()
    }

    /// All stored versions for a problem, oldest first.
    pub async fn versions(&self, problem_id: ProblemId) -> Vec<Bundle> {
        self.problems
            .lock()
            .await
            .get(&problem_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl BundleRepository for InMemoryBundleRepository {
    async fn get_current_bundle(&self, problem_id: ProblemId) -> RepositoryResult<Option<Bundle>> {
        let problems = self.problems.lock().await;
        let history = problems
            .get(&problem_id)
            .ok_or(RepositoryError::ProblemNotFound { problem_id })?;
        Ok(history.last().cloned())
    }

    async fn append_bundle_version(
        &self,
        problem_id: ProblemId,
        bundle: &Bundle,
    ) -> RepositoryResult<()> {
        let mut problems = self.problems.lock().await;
        let history = problems
            .get_mut(&problem_id)
            .ok_or(RepositoryError::ProblemNotFound { problem_id })?;

        let current = history.last().map(|b| b.version);
        if current.unwrap_or(0).checked_add(1) != Some(bundle.version) {
            return Err(RepositoryError::VersionConflict {
                problem_id,
                attempted: bundle.version,
                current,
            });
        }
        history.push(bundle.clone());
        Ok(())
    }
}
