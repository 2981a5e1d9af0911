//! Process exit codes for the judge-bundle CLI.
//! These codes are part of the public contract for upload pipelines that shell out.

use judge_bundle::{ErrorCode, IngestError};

pub const SUCCESS: i32 = 0;
pub const REJECTED: i32 = 1; // Bundle failed validation; the uploader can fix it
pub const INTERNAL_ERROR: i32 = 2; // Config, I/O, scratch or backend failure
pub const PERSISTENCE_CONFLICT: i32 = 3; // Unknown problem or lost a version race

/// Exit code for an ingestion failure.
pub fn for_ingest_error(err: &IngestError) -> i32 {
    if err.is_client_correctable() {
        REJECTED
    } else if err.code() == ErrorCode::PersistenceConflict {
        PERSISTENCE_CONFLICT
    } else {
        INTERNAL_ERROR
    }
}
