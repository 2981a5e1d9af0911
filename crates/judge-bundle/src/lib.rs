//! Testcase bundle ingestion and versioning engine.
//!
//! A testcase bundle is a gzip-compressed tar archive of flat
//! `<group>_<testcase>.<in|out>` files. Ingestion validates the archive
//! against the caller's declared groups, stamps it with a SHA-256 content
//! hash, and hands it to a [`BundleRepository`] which assigns the next
//! version atomically.
//!
//! # Modules
//!
//! - [`archive`]: streaming gzip+tar decoder
//! - [`naming`]: testcase filename grammar
//! - [`reconcile`]: group reconciliation and scratch extraction
//! - [`digest`]: content addressing
//! - [`version`]: version reconciliation protocol and repository seam
//! - [`ingest`]: the end-to-end pipeline

pub mod archive;
pub mod config;
pub mod digest;
pub mod error;
pub mod ingest;
pub mod limits;
pub mod memory;
pub mod model;
pub mod naming;
pub mod reconcile;
pub mod scratch;
pub mod version;

// Convenience re-exports
pub use config::{IngestConfig, IngestConfigOverrides};
pub use digest::content_hash;
pub use error::{ErrorClass, ErrorCode, IngestError};
pub use ingest::{BundleBuilder, BundleIngestor, IngestOutcome, IngestRequest};
pub use limits::IngestLimits;
pub use memory::InMemoryBundleRepository;
pub use model::{Bundle, BundleDraft, DeclaredGroup, Group, ProblemId, Testcase};
pub use version::{reconcile_version, BundleRepository, RepositoryError, VersionState};

// Re-export the cancellation token so callers don't need a direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;
