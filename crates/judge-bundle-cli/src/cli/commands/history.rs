use super::super::args::HistoryArgs;
use super::super::helpers::print_json;
use crate::exit_codes;
use judge_bundle_store::{SqliteBundleRepository, StoreError};
use serde::Serialize;

#[derive(Serialize)]
struct VersionRow<'a> {
    version: u32,
    current: bool,
    content_hash: &'a str,
    object_key: &'a str,
    groups: usize,
    testcases: usize,
    created_at: String,
}

pub fn run(args: HistoryArgs) -> anyhow::Result<i32> {
    let store = SqliteBundleRepository::open(&args.db)?;
    let history = match store.list_bundle_versions(args.problem) {
        Ok(history) => history,
        Err(err @ StoreError::ProblemNotFound { .. }) => {
            eprintln!("error: {}", err);
            return Ok(exit_codes::PERSISTENCE_CONFLICT);
        }
        Err(err) => return Err(err.into()),
    };
    let current = history.last().map(|s| s.bundle.version);

    let rows: Vec<VersionRow<'_>> = history
        .iter()
        .map(|s| VersionRow {
            version: s.bundle.version,
            current: Some(s.bundle.version) == current,
            content_hash: &s.bundle.content_hash,
            object_key: &s.bundle.object_key,
            groups: s.bundle.groups.len(),
            testcases: s.bundle.testcase_count(),
            created_at: s.created_at.to_rfc3339(),
        })
        .collect();
    print_json(&rows)?;
    Ok(exit_codes::SUCCESS)
}
