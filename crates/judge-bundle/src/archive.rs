//! Streaming decoder for gzip-compressed tar bundles.
//!
//! The decoder never materializes the decompressed archive: entries are
//! yielded one at a time and their payloads are read straight out of the
//! gzip stream. The sequence is finite and cannot be restarted. A decode
//! failure can surface at any entry, in which case the caller must treat the
//! whole bundle as rejected.

use crate::error::IngestError;
use crate::limits::{self, IngestLimits, LimitReader};
use flate2::read::MultiGzDecoder;
use std::io::{Read, Write};

/// Container format detected from the leading magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Gzip,
    Zip,
    Bzip2,
    Xz,
    Zstd,
    SevenZip,
    /// Uncompressed POSIX tar (`ustar` magic at offset 257).
    Tar,
    Unknown,
}

impl ArchiveFormat {
    pub fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Zip => "zip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
            Self::SevenZip => "7z",
            Self::Tar => "uncompressed tar",
            Self::Unknown => "unknown",
        }
    }
}

/// Detect the container format of `bytes` by signature.
pub fn sniff_format(bytes: &[u8]) -> ArchiveFormat {
    const SIGNATURES: &[(&[u8], ArchiveFormat)] = &[
        (&[0x1f, 0x8b], ArchiveFormat::Gzip),
        (b"PK\x03\x04", ArchiveFormat::Zip),
        (b"PK\x05\x06", ArchiveFormat::Zip),
        (b"PK\x07\x08", ArchiveFormat::Zip),
        (b"BZh", ArchiveFormat::Bzip2),
        (&[0xfd, b'7', b'z', b'X', b'Z', 0x00], ArchiveFormat::Xz),
        (&[0x28, 0xb5, 0x2f, 0xfd], ArchiveFormat::Zstd),
        (&[b'7', b'z', 0xbc, 0xaf, 0x27, 0x1c], ArchiveFormat::SevenZip),
    ];

    for (magic, format) in SIGNATURES {
        if bytes.starts_with(magic) {
            return *format;
        }
    }
    if bytes.len() >= 262 && &bytes[257..262] == b"ustar" {
        return ArchiveFormat::Tar;
    }
    ArchiveFormat::Unknown
}

/// What kind of filesystem object an entry describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Regular,
    /// PAX global header; archive metadata rather than a file.
    Metadata,
    Other(String),
}

type Stream<'a> = Box<dyn Read + 'a>;

/// A gzip+tar decoder over a borrowed byte buffer.
pub struct ArchiveDecoder<'a> {
    archive: tar::Archive<Stream<'a>>,
    limits: IngestLimits,
}

impl<'a> ArchiveDecoder<'a> {
    /// Sniff the format and set up the decode pipeline. No tar header is read yet.
    pub fn open(bytes: &'a [u8], limits: IngestLimits) -> Result<Self, IngestError> {
        if bytes.is_empty() {
            return Err(IngestError::EmptyBundle);
        }
        if bytes.len() as u64 > limits.max_bundle_bytes {
            return Err(IngestError::LimitExceeded {
                limit: limits::TAG_BUNDLE_BYTES,
                max: limits.max_bundle_bytes,
            });
        }

        match sniff_format(bytes) {
            ArchiveFormat::Gzip => {}
            ArchiveFormat::Unknown => {
                return Err(IngestError::malformed(
                    "gzip header",
                    std::io::Error::new(std::io::ErrorKind::InvalidData, "missing gzip magic"),
                ))
            }
            other => {
                return Err(IngestError::UnsupportedFormat {
                    detected: other.name(),
                })
            }
        }

        let decoder = MultiGzDecoder::new(bytes);
        let limited = LimitReader::new(decoder, limits.max_decode_bytes, limits::TAG_DECODE_BYTES);
        let stream: Stream<'a> = Box::new(limited);

        Ok(Self {
            archive: tar::Archive::new(stream),
            limits,
        })
    }

    /// Start iterating entries. Can only be called once per decoder.
    pub fn entries(&mut self) -> Result<ArchiveEntries<'_, 'a>, IngestError> {
        let limits = self.limits;
        let inner = self
            .archive
            .entries()
            .map_err(|e| classify_read_error(e, &limits, "Gzip/Tar stream"))?;
        Ok(ArchiveEntries {
            inner,
            limits,
            index: 0,
        })
    }
}

impl ArchiveDecoder<'_> {
    /// Read the stream past the tar end-of-archive marker to its end.
    ///
    /// The gzip trailer (CRC32 and size) of the last member is only checked
    /// when it is read, and bytes appended after it only surface as a bad
    /// member header. Both are decode failures of the bundle.
    pub fn finish(self) -> Result<(), IngestError> {
        let limits = self.limits;
        let mut rest = self.archive.into_inner();
        std::io::copy(&mut rest, &mut std::io::sink())
            .map(|_| ())
            .map_err(|e| classify_read_error(e, &limits, "Gzip trailer"))
    }
}

/// Iterator over decoded entries.
pub struct ArchiveEntries<'d, 'a> {
    inner: tar::Entries<'d, Stream<'a>>,
    limits: IngestLimits,
    index: usize,
}

impl<'d, 'a> Iterator for ArchiveEntries<'d, 'a> {
    type Item = Result<ArchiveEntry<'d, 'a>, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.inner.next()? {
            Ok(entry) => entry,
            Err(e) => {
                let context = format!("Entry #{}", self.index);
                return Some(Err(classify_read_error(e, &self.limits, &context)));
            }
        };
        let index = self.index;
        self.index += 1;
        Some(self.describe(entry, index))
    }
}

impl<'d, 'a> ArchiveEntries<'d, 'a> {
    fn describe(
        &self,
        entry: tar::Entry<'d, Stream<'a>>,
        index: usize,
    ) -> Result<ArchiveEntry<'d, 'a>, IngestError> {
        if index >= self.limits.max_entries {
            return Err(IngestError::LimitExceeded {
                limit: limits::TAG_ENTRIES,
                max: self.limits.max_entries as u64,
            });
        }

        let raw_name = entry.path_bytes();
        if raw_name.len() > self.limits.max_path_len {
            return Err(IngestError::LimitExceeded {
                limit: limits::TAG_PATH_LEN,
                max: self.limits.max_path_len as u64,
            });
        }
        let name = String::from_utf8_lossy(&raw_name).into_owned();

        let header = entry.header();
        let entry_type = header.entry_type();
        let kind = if entry_type.is_dir() {
            EntryKind::Directory
        } else if entry_type.is_pax_global_extensions() {
            EntryKind::Metadata
        } else if entry_type.is_file() || entry_type.is_contiguous() {
            // Old-style archives mark directories with a trailing slash only.
            if name.ends_with('/') {
                EntryKind::Directory
            } else {
                EntryKind::Regular
            }
        } else {
            EntryKind::Other(format!("{:?}", entry_type))
        };

        let size = header
            .entry_size()
            .map_err(|e| IngestError::malformed(format!("Entry #{} size", index), e))?;
        if kind == EntryKind::Regular && size > self.limits.max_entry_bytes {
            return Err(IngestError::LimitExceeded {
                limit: limits::TAG_ENTRY_BYTES,
                max: self.limits.max_entry_bytes,
            });
        }

        Ok(ArchiveEntry {
            name,
            kind,
            size,
            limits: self.limits,
            inner: entry,
        })
    }
}

/// One decoded archive entry with its payload stream.
pub struct ArchiveEntry<'d, 'a> {
    name: String,
    kind: EntryKind,
    size: u64,
    limits: IngestLimits,
    inner: tar::Entry<'d, Stream<'a>>,
}

impl ArchiveEntry<'_, '_> {
    /// Entry path as recorded in the archive (lossily decoded as UTF-8).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_regular(&self) -> bool {
        self.kind == EntryKind::Regular
    }

    /// Size declared in the tar header.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Stream the payload into `out`, separating decode faults from write faults.
    pub fn copy_to<W: Write>(&mut self, out: &mut W) -> Result<u64, IngestError> {
        let mut reader = LimitReader::new(
            &mut self.inner,
            self.limits.max_entry_bytes,
            limits::TAG_ENTRY_BYTES,
        );
        let mut buf = [0u8; 64 * 1024];
        let mut written = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(classify_read_error(e, &self.limits, &self.name)),
            };
            out.write_all(&buf[..n])
                .map_err(|e| IngestError::scratch(format!("write {}", self.name), e))?;
            written += n as u64;
        }
        Ok(written)
    }
}

fn classify_read_error(err: std::io::Error, limits: &IngestLimits, context: &str) -> IngestError {
    match limits::limit_tag(&err) {
        Some(tag) if tag == limits::TAG_DECODE_BYTES => IngestError::LimitExceeded {
            limit: tag,
            max: limits.max_decode_bytes,
        },
        Some(tag) if tag == limits::TAG_ENTRY_BYTES => IngestError::LimitExceeded {
            limit: tag,
            max: limits.max_entry_bytes,
        },
        _ => IngestError::malformed(context, err),
    }
}
