use super::super::args::HashArgs;
use super::super::helpers::read_archive;
use crate::exit_codes;

pub fn run(args: HashArgs) -> anyhow::Result<i32> {
    let bytes = read_archive(&args.archive)?;
    println!("{}", judge_bundle::content_hash(&bytes));
    Ok(exit_codes::SUCCESS)
}
