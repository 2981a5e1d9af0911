use super::args::PipelineOpts;
use anyhow::Context;
use judge_bundle::{CancellationToken, DeclaredGroup, IngestConfig, IngestConfigOverrides};
use serde::Serialize;
use std::path::Path;

/// Resolve the engine config: defaults, then the overrides file, then `--scratch-dir`.
pub fn load_config(opts: &PipelineOpts) -> anyhow::Result<IngestConfig> {
    let mut config = IngestConfig::default();
    if let Some(path) = &opts.config {
        config = config.apply(IngestConfigOverrides::load(path)?);
    }
    if let Some(dir) = &opts.scratch_dir {
        config = config.with_scratch_dir(dir);
    }
    Ok(config)
}

/// Load declared groups from a YAML or JSON list.
pub fn load_groups(path: &Path) -> anyhow::Result<Vec<DeclaredGroup>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read groups file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("invalid groups file: {}", path.display()))
}

pub fn read_archive(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read archive: {}", path.display()))
}

/// Object key recorded when none is given: the archive's file name.
pub fn default_object_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Token cancelled on Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling");
            child.cancel();
        }
    });
    token
}
