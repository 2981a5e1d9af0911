use super::super::args::*;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Validate(args) => super::validate::run(args).await,
        Command::Ingest(args) => super::ingest::run(args).await,
        Command::Problem(args) => match args.cmd {
            ProblemSub::Create(create) => super::problem::cmd_create(create),
        },
        Command::History(args) => super::history::run(args),
        Command::Hash(args) => super::hash::run(args),
    }
}
