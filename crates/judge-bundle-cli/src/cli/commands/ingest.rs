use super::super::args::IngestArgs;
use super::super::helpers::{
    cancel_on_ctrl_c, default_object_key, load_config, load_groups, print_json, read_archive,
};
use super::report_ingest_error;
use crate::exit_codes;
use judge_bundle::{Bundle, BundleIngestor, IngestOutcome, IngestRequest};
use judge_bundle_store::SqliteBundleRepository;
use serde::Serialize;

#[derive(Serialize)]
struct IngestReport<'a> {
    problem_id: i64,
    outcome: &'static str,
    bundle: &'a Bundle,
}

pub async fn run(args: IngestArgs) -> anyhow::Result<i32> {
    let config = load_config(&args.pipeline)?;
    let groups = load_groups(&args.pipeline.groups)?;
    let archive = read_archive(&args.archive)?;
    let object_key = args
        .object_key
        .unwrap_or_else(|| default_object_key(&args.archive));

    let store = SqliteBundleRepository::open(&args.db)?;
    let ingestor = BundleIngestor::new(store, config);
    let request = IngestRequest {
        problem_id: args.problem,
        object_key: &object_key,
        archive: &archive,
        groups: &groups,
    };

    match ingestor.ingest(request, &cancel_on_ctrl_c()).await {
        Ok(outcome) => {
            let label = match &outcome {
                IngestOutcome::Created(_) => "created",
                IngestOutcome::Unchanged(_) => "unchanged",
            };
            print_json(&IngestReport {
                problem_id: args.problem,
                outcome: label,
                bundle: outcome.bundle(),
            })?;
            Ok(exit_codes::SUCCESS)
        }
        Err(err) => Ok(report_ingest_error(&err)),
    }
}
