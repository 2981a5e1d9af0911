use super::super::args::ProblemCreateArgs;
use super::super::helpers::print_json;
use crate::exit_codes;
use judge_bundle_store::SqliteBundleRepository;

pub fn cmd_create(args: ProblemCreateArgs) -> anyhow::Result<i32> {
    let store = SqliteBundleRepository::open(&args.db)?;
    let problem_id = store.create_problem(&args.title)?;
    print_json(&serde_json::json!({
        "problem_id": problem_id,
        "title": args.title,
    }))?;
    Ok(exit_codes::SUCCESS)
}
