pub mod dispatch;
pub mod hash;
pub mod history;
pub mod ingest;
pub mod problem;
pub mod validate;

pub use dispatch::dispatch;

use crate::exit_codes;
use judge_bundle::IngestError;

/// Report an ingestion failure on stderr and pick the exit code.
pub(crate) fn report_ingest_error(err: &IngestError) -> i32 {
    eprintln!("error[{}]: {}", err.code(), err);
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
    exit_codes::for_ingest_error(err)
}
