use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "judge-bundle",
    version,
    about = "Validate, hash and version testcase bundles (.tar.gz) for online judge problems"
)]
pub struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Dry-run: validate an archive against declared groups and print the manifest
    Validate(ValidateArgs),
    /// Validate an archive and store it as the problem's next bundle version
    Ingest(IngestArgs),
    /// Problem registry
    Problem(ProblemArgs),
    /// List stored bundle versions of a problem
    History(HistoryArgs),
    /// Print the content hash of an archive
    Hash(HashArgs),
}

/// Options shared by commands that run the validation pipeline.
#[derive(Args, Debug, Clone)]
pub struct PipelineOpts {
    /// Declared groups file (YAML or JSON list of {order_id, name, points})
    #[arg(long)]
    pub groups: PathBuf,

    /// Base directory for scratch extraction (default: OS temp dir)
    #[arg(long, env = "JUDGE_BUNDLE_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Ingest config overrides file (scratch_dir, limits)
    #[arg(long, env = "JUDGE_BUNDLE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Bundle archive (.tar.gz)
    pub archive: PathBuf,

    #[command(flatten)]
    pub pipeline: PipelineOpts,

    /// Copy extracted testcase files into this directory
    #[arg(long)]
    pub export_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Bundle archive (.tar.gz)
    pub archive: PathBuf,

    /// Problem id
    #[arg(long)]
    pub problem: i64,

    #[command(flatten)]
    pub pipeline: PipelineOpts,

    /// Object key recorded with the bundle (default: archive file name)
    #[arg(long)]
    pub object_key: Option<String>,

    /// SQLite database path
    #[arg(long, env = "JUDGE_BUNDLE_DB")]
    pub db: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ProblemArgs {
    #[command(subcommand)]
    pub cmd: ProblemSub,
}

#[derive(Subcommand, Debug)]
pub enum ProblemSub {
    /// Register a new problem (no bundle yet)
    Create(ProblemCreateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ProblemCreateArgs {
    #[arg(long)]
    pub title: String,

    /// SQLite database path
    #[arg(long, env = "JUDGE_BUNDLE_DB")]
    pub db: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// Problem id
    #[arg(long)]
    pub problem: i64,

    /// SQLite database path
    #[arg(long, env = "JUDGE_BUNDLE_DB")]
    pub db: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct HashArgs {
    /// Bundle archive
    pub archive: PathBuf,
}
