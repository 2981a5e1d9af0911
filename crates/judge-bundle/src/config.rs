//! Ingestion configuration.
//!
//! The scratch base directory is an explicit parameter. The engine never
//! consults environment variables; binaries resolve those at their edge and
//! pass the result in.

use crate::limits::{IngestLimits, IngestLimitsOverrides};
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Directory under which per-ingestion scratch areas are created.
    pub scratch_dir: PathBuf,
    pub limits: IngestLimits,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir(),
            limits: IngestLimits::default(),
        }
    }
}

impl IngestConfig {
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn with_limits(mut self, limits: IngestLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Apply overrides onto this config. Only `Some` values override.
    pub fn apply(self, overrides: IngestConfigOverrides) -> Self {
        Self {
            scratch_dir: overrides.scratch_dir.unwrap_or(self.scratch_dir),
            limits: match overrides.limits {
                Some(limits) => self.limits.apply(limits),
                None => self.limits,
            },
        }
    }
}

/// Partial config as read from a YAML (or JSON) file.
///
/// ```yaml
/// scratch_dir: /var/lib/judge/scratch
/// limits:
///   max_entries: 5000
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfigOverrides {
    pub scratch_dir: Option<PathBuf>,
    pub limits: Option<IngestLimitsOverrides>,
}

impl IngestConfigOverrides {
    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("failed to parse ingest config")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_overrides() {
        let overrides = IngestConfigOverrides::from_yaml_str(
            "scratch_dir: /srv/scratch\nlimits:\n  max_entries: 12\n",
        )
        .unwrap();
        let config = IngestConfig::default().apply(overrides);
        assert_eq!(config.scratch_dir, PathBuf::from("/srv/scratch"));
        assert_eq!(config.limits.max_entries, 12);
        assert_eq!(
            config.limits.max_path_len,
            IngestLimits::default().max_path_len
        );
    }

    #[test]
    fn test_json_is_accepted() {
        let overrides =
            IngestConfigOverrides::from_yaml_str(r#"{"limits": {"max_entry_bytes": 10}}"#).unwrap();
        let config = IngestConfig::default().apply(overrides);
        assert_eq!(config.limits.max_entry_bytes, 10);
        assert_eq!(config.scratch_dir, std::env::temp_dir());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(IngestConfigOverrides::from_yaml_str("scratch: /tmp\n").is_err());
        assert!(IngestConfigOverrides::from_yaml_str("limits:\n  max_files: 1\n").is_err());
    }
}
