//! SQLite persistence for judge-bundle.
//!
//! [`SqliteBundleRepository`] keeps the problem registry and the
//! append-only history of testcase bundle versions, and implements
//! [`judge_bundle::BundleRepository`] with a transactional
//! compare-and-swap append.

mod error;
mod repository;
mod schema;
mod store;
mod txn;

pub use error::StoreError;
pub use schema::BUNDLE_SCHEMA;
pub use store::{ProblemRecord, SqliteBundleRepository, StoredBundle};
