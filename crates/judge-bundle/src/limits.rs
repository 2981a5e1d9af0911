//! Resource limits and bounded readers for bundle ingestion.
//!
//! Byte, entry and path limits for DoS protection against hostile uploads.

use serde::Deserialize;
use std::io::Read;

pub(crate) const TAG_BUNDLE_BYTES: &str = "LimitBundleBytes";
pub(crate) const TAG_DECODE_BYTES: &str = "LimitDecodeBytes";
pub(crate) const TAG_ENTRY_BYTES: &str = "LimitEntryBytes";
pub(crate) const TAG_ENTRIES: &str = "LimitEntries";
pub(crate) const TAG_PATH_LEN: &str = "LimitPathLength";

/// Resource limits for bundle ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestLimits {
    pub max_bundle_bytes: u64,
    pub max_decode_bytes: u64,
    pub max_entry_bytes: u64,
    pub max_entries: usize,
    pub max_path_len: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_bundle_bytes: 256 * 1024 * 1024,      // 256 MB compressed
            max_decode_bytes: 2 * 1024 * 1024 * 1024, // 2 GB uncompressed
            max_entry_bytes: 512 * 1024 * 1024,       // 512 MB per file
            max_entries: 20_000,
            max_path_len: 256,
        }
    }
}

/// Partial overrides for `IngestLimits`. Used for CLI/config parsing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestLimitsOverrides {
    pub max_bundle_bytes: Option<u64>,
    pub max_decode_bytes: Option<u64>,
    pub max_entry_bytes: Option<u64>,
    pub max_entries: Option<usize>,
    pub max_path_len: Option<usize>,
}

impl IngestLimits {
    /// Apply overrides onto these defaults. Only `Some` values override.
    pub fn apply(self, overrides: IngestLimitsOverrides) -> Self {
        Self {
            max_bundle_bytes: overrides.max_bundle_bytes.unwrap_or(self.max_bundle_bytes),
            max_decode_bytes: overrides.max_decode_bytes.unwrap_or(self.max_decode_bytes),
            max_entry_bytes: overrides.max_entry_bytes.unwrap_or(self.max_entry_bytes),
            max_entries: overrides.max_entries.unwrap_or(self.max_entries),
            max_path_len: overrides.max_path_len.unwrap_or(self.max_path_len),
        }
    }
}

/// A reader that limits the total number of bytes read and fails explicitly on overflow.
pub(crate) struct LimitReader<R> {
    inner: R,
    limit: u64,
    read: u64,
    error_tag: &'static str,
}

impl<R: Read> LimitReader<R> {
    pub(crate) fn new(inner: R, limit: u64, error_tag: &'static str) -> Self {
        Self {
            inner,
            limit,
            read: 0,
            error_tag,
        }
    }
}

impl<R: Read> Read for LimitReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.read >= self.limit {
            // Only an error if the stream actually has more data.
            let mut extra = [0u8; 1];
            return match self.inner.read(&mut extra)? {
                0 => Ok(0),
                _ => Err(limit_error(self.error_tag, self.limit)),
            };
        }

        let max_to_read = (self.limit - self.read).min(buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..max_to_read])?;
        self.read += n as u64;

        Ok(n)
    }
}

fn limit_error(tag: &'static str, limit: u64) -> std::io::Error {
    std::io::Error::other(format!("{}: exceeded limit of {} bytes", tag, limit))
}

/// Recover the limit tag from an I/O error raised by a [`LimitReader`].
///
/// The tar and gzip layers wrap reader errors, so the tag is matched in the
/// rendered message rather than by downcasting.
pub(crate) fn limit_tag(err: &std::io::Error) -> Option<&'static str> {
    let msg = err.to_string();
    [TAG_DECODE_BYTES, TAG_ENTRY_BYTES, TAG_BUNDLE_BYTES]
        .into_iter()
        .find(|tag| msg.contains(tag))
}
