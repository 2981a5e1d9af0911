//! Group reconciliation.
//!
//! Cross-references decoded archive entries against the uploader's declared
//! groups. The declared list is never mutated: reconciliation produces a new
//! `Vec<Group>` with each group's testcases populated and sorted.

use crate::archive::{ArchiveDecoder, EntryKind};
use crate::error::{EntryRejection, IngestError};
use crate::model::{DeclaredGroup, Group, Testcase};
use crate::naming::{self, TestcaseKind, TestcaseName};
use crate::scratch::ScratchArea;
use std::collections::BTreeMap;
use std::io::Write;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Clone, Copy)]
struct PairState {
    input: bool,
    output: bool,
}

impl PairState {
    fn missing(self) -> Option<TestcaseKind> {
        match (self.input, self.output) {
            (true, true) => None,
            (false, _) => Some(TestcaseKind::Input),
            (true, false) => Some(TestcaseKind::Output),
        }
    }
}

/// Accumulates which testcase files have been seen for each declared group.
#[derive(Debug)]
pub struct GroupReconciler<'g> {
    declared: &'g [DeclaredGroup],
    orders: Vec<BTreeMap<u32, PairState>>,
    accepted: usize,
}

impl<'g> GroupReconciler<'g> {
    pub fn new(declared: &'g [DeclaredGroup]) -> Self {
        Self {
            declared,
            orders: vec![BTreeMap::new(); declared.len()],
            accepted: 0,
        }
    }

    /// Number of files accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// Register one testcase file.
    pub fn record(&mut self, name: &TestcaseName) -> Result<(), IngestError> {
        let declared = self.declared.len();
        let orders = self
            .orders
            .get_mut(name.group)
            .ok_or_else(|| IngestError::UnknownGroup {
                name: name.base.clone(),
                group: name.group,
                declared,
            })?;

        let pair = orders.entry(name.order).or_default();
        let flag = match name.kind {
            TestcaseKind::Input => &mut pair.input,
            TestcaseKind::Output => &mut pair.output,
        };
        if *flag {
            return Err(IngestError::DuplicateTestcaseFile {
                name: name.base.clone(),
                group: name.group,
                order: name.order,
                kind: name.kind,
            });
        }
        *flag = true;
        self.accepted += 1;
        Ok(())
    }

    /// Check completeness and contiguity, and build the populated groups.
    pub fn finish(self) -> Result<Vec<Group>, IngestError> {
        if self.accepted == 0 {
            return Err(IngestError::EmptyBundle);
        }

        let mut groups = Vec::with_capacity(self.declared.len());
        for (group, (declared, orders)) in self.declared.iter().zip(self.orders).enumerate() {
            for (&order, pair) in &orders {
                if let Some(missing) = pair.missing() {
                    return Err(IngestError::IncompleteTestcasePair {
                        group,
                        order,
                        missing,
                    });
                }
            }

            // BTreeMap keys are sorted and unique, so contiguity reduces to key == position.
            for (expected, &found) in (0u32..).zip(orders.keys()) {
                if found != expected {
                    return Err(IngestError::NonContiguousOrdering {
                        group,
                        expected,
                        found,
                    });
                }
            }

            let testcases = orders
                .keys()
                .map(|&order_id| Testcase { order_id })
                .collect();
            groups.push(Group::from_declared(declared, testcases));
        }
        Ok(groups)
    }
}

/// Run the single decode pass over `decoder`.
///
/// Every regular entry is validated against the filename grammar, recorded
/// in the reconciler, and extracted into `scratch` under its base name.
/// The cancellation token is checked before each entry. The decoder is
/// drained to the end of the gzip stream before the groups are accepted.
pub fn reconcile_archive(
    mut decoder: ArchiveDecoder<'_>,
    declared: &[DeclaredGroup],
    scratch: &ScratchArea,
    cancel: &CancellationToken,
) -> Result<Vec<Group>, IngestError> {
    let mut reconciler = GroupReconciler::new(declared);

    for entry in decoder.entries()? {
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }
        let mut entry = entry?;

        match entry.kind() {
            EntryKind::Directory => continue,
            EntryKind::Metadata => {
                tracing::debug!(name = entry.name(), "skipping pax global header");
                continue;
            }
            EntryKind::Other(entry_type) => {
                return Err(IngestError::UnsupportedEntry {
                    name: entry.name().to_string(),
                    reason: EntryRejection::NotRegular {
                        entry_type: entry_type.clone(),
                    },
                });
            }
            EntryKind::Regular => {}
        }

        let name = naming::parse_entry_name(entry.name())?;
        reconciler.record(&name)?;

        let mut out = scratch.create_file(&name.base)?;
        let written = entry.copy_to(&mut out)?;
        out.flush()
            .map_err(|e| IngestError::scratch(format!("flush {}", name.base), e))?;

        tracing::debug!(
            file = %name.base,
            group = name.group,
            order = name.order,
            bytes = written,
            "extracted testcase file"
        );
    }

    decoder.finish()?;
    reconciler.finish()
}
