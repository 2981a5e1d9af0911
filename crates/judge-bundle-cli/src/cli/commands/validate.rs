use super::super::args::ValidateArgs;
use super::super::helpers::{
    cancel_on_ctrl_c, default_object_key, load_config, load_groups, print_json, read_archive,
};
use super::report_ingest_error;
use crate::exit_codes;
use anyhow::Context;
use judge_bundle::BundleBuilder;
use std::path::Path;

pub async fn run(args: ValidateArgs) -> anyhow::Result<i32> {
    let config = load_config(&args.pipeline)?;
    let groups = load_groups(&args.pipeline.groups)?;
    let archive = read_archive(&args.archive)?;
    let object_key = default_object_key(&args.archive);
    let export_dir = args.export_dir;
    let cancel = cancel_on_ctrl_c();

    let result = tokio::task::spawn_blocking(move || {
        let builder = BundleBuilder::new(config);
        match &export_dir {
            Some(dir) => builder.build_with(&object_key, &archive, &groups, &cancel, |scratch, _| {
                export_testcases(scratch, dir)
            }),
            None => builder.build(&object_key, &archive, &groups, &cancel),
        }
    })
    .await
    .context("validation task failed")?;

    match result {
        Ok(draft) => {
            print_json(&draft)?;
            Ok(exit_codes::SUCCESS)
        }
        Err(err) => Ok(report_ingest_error(&err)),
    }
}

fn export_testcases(scratch: &Path, dest: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("failed to create export dir: {}", dest.display()))?;
    for entry in std::fs::read_dir(scratch)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        std::fs::copy(entry.path(), &target)
            .with_context(|| format!("failed to export {}", target.display()))?;
    }
    Ok(())
}
