//! Content addressing for testcase bundles.
//!
//! The bundle identity is the SHA-256 of the raw archive bytes as uploaded,
//! encoded as 64 lowercase hex characters (no `sha256:` prefix). Two uploads
//! with identical bytes always share an identity, which is what makes
//! re-uploads a no-op in [`crate::version`].

use sha2::{Digest, Sha256};

/// Compute the content hash of a raw archive.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
