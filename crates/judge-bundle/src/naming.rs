//! Testcase filename grammar.
//!
//! Bundle entries are flat files named `<group>_<testcase>.<in|out>`, e.g.
//! `0_0.in`, `2_11.out`. Indices are ASCII decimal; leading zeros are
//! accepted.

use crate::error::{EntryRejection, IngestError};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Which half of a testcase pair a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestcaseKind {
    Input,
    Output,
}

impl TestcaseKind {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Input => "in",
            Self::Output => "out",
        }
    }
}

impl std::fmt::Display for TestcaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// A parsed testcase filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestcaseName {
    /// Base filename as it appeared in the archive (after normalization).
    pub base: String,
    pub group: usize,
    pub order: u32,
    pub kind: TestcaseKind,
}

fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // ASCII digits only: `\d` would also match other Unicode decimal digits.
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9]+)_([0-9]+)\.(in|out)$").expect("testcase filename pattern is valid")
    })
}

/// Lexically normalize a POSIX path: drop empty and `.` segments, resolve `..`.
///
/// Returns an empty string when nothing remains. A rooted path keeps its
/// leading `/`, so it can never normalize to a bare filename.
pub fn normalize_posix(name: &str) -> String {
    let rooted = name.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if rooted {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Validate an archive entry name and parse it into a testcase name.
///
/// Checks, in order: the normalized name is non-empty, contains no
/// directory component, contains no backslash, and matches the grammar.
pub fn parse_entry_name(name: &str) -> Result<TestcaseName, IngestError> {
    let clean = normalize_posix(name);
    if clean.is_empty() {
        return Err(IngestError::InvalidFilename {
            name: name.to_string(),
        });
    }
    if clean.contains('/') {
        return Err(IngestError::UnsupportedEntry {
            name: name.to_string(),
            reason: EntryRejection::NestedPath,
        });
    }
    if clean.contains('\\') {
        return Err(IngestError::InvalidFilename { name: clean });
    }
    parse_base_name(&clean)
}

/// Parse a bare base filename against the grammar.
pub fn parse_base_name(base: &str) -> Result<TestcaseName, IngestError> {
    let invalid = || IngestError::InvalidFilename {
        name: base.to_string(),
    };

    let caps = filename_pattern().captures(base).ok_or_else(invalid)?;
    let group = caps[1].parse::<usize>().map_err(|_| invalid())?;
    let order = caps[2].parse::<u32>().map_err(|_| invalid())?;
    let kind = match &caps[3] {
        "in" => TestcaseKind::Input,
        "out" => TestcaseKind::Output,
        _ => return Err(invalid()),
    };

    Ok(TestcaseName {
        base: base.to_string(),
        group,
        order,
        kind,
    })
}
