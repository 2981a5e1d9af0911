//! End-to-end ingestion pipeline.
//!
//! ```text
//! bytes + declared groups
//!   -> ArchiveDecoder      (format gate, gzip+tar stream)
//!   -> naming              (filename grammar, flat layout)
//!   -> GroupReconciler     (bounds, duplicates, pairs, contiguity)
//!   -> content_hash        (identity)
//!   -> reconcile_version   (no-op or next version, via the repository)
//! ```
//!
//! [`BundleBuilder`] runs everything up to the content hash and is usable
//! on its own for dry-run validation. [`BundleIngestor`] adds the version
//! protocol on top.

use crate::archive::{ArchiveDecoder, ArchiveFormat};
use crate::config::IngestConfig;
use crate::digest::content_hash;
use crate::error::IngestError;
use crate::model::{BundleDraft, DeclaredGroup, ProblemId};
use crate::reconcile::reconcile_archive;
use crate::scratch::ScratchArea;
use crate::version::{reconcile_version, BundleRepository};
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub use crate::version::IngestOutcome;

/// One ingestion call.
#[derive(Debug, Clone, Copy)]
pub struct IngestRequest<'a> {
    pub problem_id: ProblemId,
    /// External storage locator, typically the uploaded filename.
    pub object_key: &'a str,
    pub archive: &'a [u8],
    pub groups: &'a [DeclaredGroup],
}

/// Validates archives and produces unversioned drafts.
#[derive(Debug, Clone, Default)]
pub struct BundleBuilder {
    config: IngestConfig,
}

impl BundleBuilder {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Validate `archive` against `groups` and build the draft manifest.
    pub fn build(
        &self,
        object_key: &str,
        archive: &[u8],
        groups: &[DeclaredGroup],
        cancel: &CancellationToken,
    ) -> Result<BundleDraft, IngestError> {
        self.build_with(object_key, archive, groups, cancel, |_, _| Ok(()))
    }

    /// Like [`build`](Self::build), but calls `visit` with the scratch
    /// directory and the validated draft before the scratch area is removed.
    ///
    /// This is the only window in which extracted payloads can be read.
    /// An error from `visit` fails the build.
    pub fn build_with<F>(
        &self,
        object_key: &str,
        archive: &[u8],
        groups: &[DeclaredGroup],
        cancel: &CancellationToken,
        visit: F,
    ) -> Result<BundleDraft, IngestError>
    where
        F: FnOnce(&Path, &BundleDraft) -> anyhow::Result<()>,
    {
        let result = self.build_inner(object_key, archive, groups, cancel, visit);
        if let Err(err) = &result {
            tracing::warn!(
                object_key,
                code = %err.code(),
                class = %err.class(),
                error = %err,
                "bundle rejected"
            );
        }
        result
    }

    fn build_inner<F>(
        &self,
        object_key: &str,
        archive: &[u8],
        groups: &[DeclaredGroup],
        cancel: &CancellationToken,
        visit: F,
    ) -> Result<BundleDraft, IngestError>
    where
        F: FnOnce(&Path, &BundleDraft) -> anyhow::Result<()>,
    {
        if archive.is_empty() {
            return Err(IngestError::EmptyBundle);
        }
        if object_key.trim().to_ascii_lowercase().ends_with(".zip") {
            return Err(IngestError::UnsupportedFormat {
                detected: ArchiveFormat::Zip.name(),
            });
        }
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }

        let decoder = ArchiveDecoder::open(archive, self.config.limits)?;
        let scratch = ScratchArea::acquire(&self.config.scratch_dir)?;
        let groups = reconcile_archive(decoder, groups, &scratch, cancel)?;

        let draft = BundleDraft {
            object_key: object_key.to_string(),
            content_hash: content_hash(archive),
            groups,
        };
        visit(scratch.path(), &draft).map_err(|e| {
            IngestError::scratch("extraction visitor failed", std::io::Error::other(e))
        })?;
        scratch.release()?;

        tracing::debug!(
            object_key,
            content_hash = %draft.content_hash,
            groups = draft.groups.len(),
            testcases = draft.testcase_count(),
            "bundle validated"
        );
        Ok(draft)
    }
}

/// Validates archives and stores them as new bundle versions.
pub struct BundleIngestor<R> {
    repo: R,
    builder: BundleBuilder,
}

impl<R: BundleRepository> BundleIngestor<R> {
    pub fn new(repo: R, config: IngestConfig) -> Self {
        Self {
            repo,
            builder: BundleBuilder::new(config),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn builder(&self) -> &BundleBuilder {
        &self.builder
    }

    /// Run the full pipeline for one upload.
    ///
    /// Decoding and extraction run on the blocking pool. Any error leaves the
    /// repository untouched and the scratch area removed.
    pub async fn ingest(
        &self,
        request: IngestRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<IngestOutcome, IngestError> {
        let draft = self.build_blocking(request, cancel).await?;
        let outcome = reconcile_version(&self.repo, request.problem_id, draft, cancel).await;
        if let Err(err) = &outcome {
            tracing::warn!(
                problem_id = request.problem_id,
                code = %err.code(),
                error = %err,
                "bundle version not stored"
            );
        }
        outcome
    }

    async fn build_blocking(
        &self,
        request: IngestRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<BundleDraft, IngestError> {
        let builder = self.builder.clone();
        let object_key = request.object_key.to_owned();
        let archive = request.archive.to_vec();
        let groups = request.groups.to_vec();
        let cancel = cancel.clone();

        let task = tokio::task::spawn_blocking(move || {
            builder.build(&object_key, &archive, &groups, &cancel)
        });
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            // Only happens when the runtime is shutting down.
            Err(_) => Err(IngestError::Cancelled),
        }
    }
}
