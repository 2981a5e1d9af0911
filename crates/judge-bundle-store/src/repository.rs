//! `BundleRepository` adapter. SQLite calls run on the blocking pool.

use crate::error::StoreError;
use crate::store::SqliteBundleRepository;
use async_trait::async_trait;
use judge_bundle::version::RepositoryResult;
use judge_bundle::{Bundle, BundleRepository, ProblemId};

impl SqliteBundleRepository {
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(SqliteBundleRepository) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl BundleRepository for SqliteBundleRepository {
    async fn get_current_bundle(&self, problem_id: ProblemId) -> RepositoryResult<Option<Bundle>> {
        let current = self
            .blocking(move |store| store.current_bundle_sync(problem_id))
            .await?;
        Ok(current)
    }

    async fn append_bundle_version(
        &self,
        problem_id: ProblemId,
        bundle: &Bundle,
    ) -> RepositoryResult<()> {
        let bundle = bundle.clone();
        self.blocking(move |store| store.append_bundle_version_sync(problem_id, &bundle))
            .await?;
        Ok(())
    }
}
