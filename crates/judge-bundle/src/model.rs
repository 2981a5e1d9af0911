//! Bundle manifest types.
//!
//! A [`Bundle`] is an immutable, versioned snapshot of a problem's test
//! data. Payload bytes never appear here: a [`Testcase`] only records that a
//! complete `.in`/`.out` pair existed in the archive.

use serde::{Deserialize, Serialize};

/// Identifier of the problem that owns a bundle history.
pub type ProblemId = i64;

/// A testcase group as declared by the uploader, before reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredGroup {
    pub order_id: u32,
    pub name: String,
    #[serde(default)]
    pub points: u32,
}

/// One input/output pair inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Testcase {
    pub order_id: u32,
}

/// A named, ordered collection of testcases scored together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub order_id: u32,
    pub name: String,
    pub points: u32,
    /// Sorted by `order_id`, contiguous from 0.
    #[serde(default)]
    pub testcases: Vec<Testcase>,
}

impl Group {
    /// Build a populated group from its declaration.
    pub fn from_declared(declared: &DeclaredGroup, testcases: Vec<Testcase>) -> Self {
        Self {
            order_id: declared.order_id,
            name: declared.name.clone(),
            points: declared.points,
            testcases,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.testcases.is_empty()
    }
}

/// A validated bundle that has not been assigned a version yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleDraft {
    pub object_key: String,
    pub content_hash: String,
    pub groups: Vec<Group>,
}

impl BundleDraft {
    /// Stamp the draft with its version, producing the immutable bundle.
    pub fn into_version(self, version: u32) -> Bundle {
        Bundle {
            object_key: self.object_key,
            content_hash: self.content_hash,
            version,
            groups: self.groups,
        }
    }

    /// Total number of testcase pairs across all groups.
    pub fn testcase_count(&self) -> usize {
        self.groups.iter().map(|g| g.testcases.len()).sum()
    }
}

/// An immutable, versioned testcase bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub object_key: String,
    /// Lowercase hex SHA-256 of the raw archive bytes.
    pub content_hash: String,
    /// Starts at 1 and increases by one per stored change.
    pub version: u32,
    pub groups: Vec<Group>,
}

impl Bundle {
    pub fn testcase_count(&self) -> usize {
        self.groups.iter().map(|g| g.testcases.len()).sum()
    }
}
