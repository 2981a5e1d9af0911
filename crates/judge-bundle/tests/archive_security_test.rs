//! Hostile archive tests.
//!
//! Archives here are assembled from raw tar headers so that names the `tar`
//! builder would refuse (`..`, absolute paths) can be planted directly.

use flate2::write::GzEncoder;
use flate2::Compression;
use judge_bundle::{
    BundleBuilder, CancellationToken, DeclaredGroup, ErrorClass, ErrorCode, IngestConfig,
    IngestError, IngestLimits,
};

enum Raw<'a> {
    File(&'a str, &'a [u8]),
    Dir(&'a str),
    Symlink(&'a str, &'a str),
    HardLink(&'a str, &'a str),
}

fn raw_header(name: &str, entry_type: tar::EntryType, size: u64) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    let field = &mut header.as_gnu_mut().unwrap().name;
    assert!(name.len() < field.len(), "test name too long for raw header");
    field[..name.len()].copy_from_slice(name.as_bytes());
    header.set_entry_type(entry_type);
    header.set_size(size);
    header.set_mode(0o644);
    header.set_mtime(0);
    header
}

fn build(entries: &[Raw<'_>]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for entry in entries {
        match entry {
            Raw::File(name, data) => {
                let mut h = raw_header(name, tar::EntryType::Regular, data.len() as u64);
                h.set_cksum();
                builder.append(&h, *data).unwrap();
            }
            Raw::Dir(name) => {
                let mut h = raw_header(name, tar::EntryType::Directory, 0);
                h.set_cksum();
                builder.append(&h, std::io::empty()).unwrap();
            }
            Raw::Symlink(name, target) | Raw::HardLink(name, target) => {
                let kind = if matches!(entry, Raw::Symlink(..)) {
                    tar::EntryType::Symlink
                } else {
                    tar::EntryType::Link
                };
                let mut h = raw_header(name, kind, 0);
                h.set_link_name(target).unwrap();
                h.set_cksum();
                builder.append(&h, std::io::empty()).unwrap();
            }
        }
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn one_group() -> Vec<DeclaredGroup> {
    vec![DeclaredGroup {
        order_id: 0,
        name: "main".into(),
        points: 100,
    }]
}

fn check(entries: &[Raw<'_>]) -> (Result<(), IngestError>, tempfile::TempDir) {
    check_with(entries, IngestLimits::default())
}

fn check_with(
    entries: &[Raw<'_>],
    limits: IngestLimits,
) -> (Result<(), IngestError>, tempfile::TempDir) {
    let base = tempfile::tempdir().unwrap();
    let builder = BundleBuilder::new(
        IngestConfig::default()
            .with_scratch_dir(base.path())
            .with_limits(limits),
    );
    let archive = build(entries);
    let result = builder
        .build("t.tar.gz", &archive, &one_group(), &CancellationToken::new())
        .map(|_| ());
    (result, base)
}

fn assert_nothing_written(base: &tempfile::TempDir) {
    assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);
    // Traversal targets relative to the scratch base must not exist either.
    assert!(!base.path().parent().unwrap().join("0_0.in").exists());
}

#[test]
fn test_parent_traversal_rejected() {
    let (result, base) = check(&[
        Raw::File("../0_0.in", b"pwned"),
        Raw::File("0_0.out", b"1"),
    ]);
    let err = result.unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnsupportedEntry);
    assert_eq!(err.class(), ErrorClass::Security);
    assert_nothing_written(&base);
}

#[test]
fn test_absolute_path_rejected() {
    let (result, base) = check(&[Raw::File("/tmp/0_0.in", b"x"), Raw::File("0_0.out", b"1")]);
    assert_eq!(result.unwrap_err().code(), ErrorCode::UnsupportedEntry);
    assert_nothing_written(&base);
}

#[test]
fn test_rooted_bare_name_rejected() {
    // "/0_0.in" has a bare base name but is still rooted.
    let (result, _base) = check(&[Raw::File("/0_0.in", b"x"), Raw::File("0_0.out", b"1")]);
    assert_eq!(result.unwrap_err().code(), ErrorCode::UnsupportedEntry);
}

#[test]
fn test_nested_directory_file_rejected() {
    let (result, _base) = check(&[
        Raw::Dir("tests/"),
        Raw::File("tests/0_0.in", b"1"),
        Raw::File("tests/0_0.out", b"1"),
    ]);
    let err = result.unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnsupportedEntry);
    assert!(err.to_string().contains("bundle must not contain directories"));
}

#[test]
fn test_dot_prefix_normalizes_to_flat_name() {
    let (result, base) = check(&[Raw::File("./0_0.in", b"1"), Raw::File("0_0.out", b"1")]);
    result.unwrap();
    assert_nothing_written(&base);
}

#[test]
fn test_directory_entries_skipped() {
    let (result, _base) = check(&[
        Raw::Dir("./"),
        Raw::Dir("unused/"),
        Raw::File("0_0.in", b"1"),
        Raw::File("0_0.out", b"1"),
    ]);
    result.unwrap();
}

#[test]
fn test_symlink_rejected() {
    let (result, base) = check(&[
        Raw::Symlink("0_0.in", "/etc/passwd"),
        Raw::File("0_0.out", b"1"),
    ]);
    match result.unwrap_err() {
        IngestError::UnsupportedEntry { name, .. } => assert_eq!(name, "0_0.in"),
        other => panic!("unexpected {other}"),
    }
    assert_nothing_written(&base);
}

#[test]
fn test_hard_link_rejected() {
    let (result, _base) = check(&[
        Raw::File("0_0.out", b"1"),
        Raw::HardLink("0_0.in", "0_0.out"),
    ]);
    assert_eq!(result.unwrap_err().code(), ErrorCode::UnsupportedEntry);
}

#[test]
fn test_backslash_name_rejected() {
    let (result, _base) = check(&[Raw::File("0_0\\0.in", b"1"), Raw::File("0_0.out", b"1")]);
    assert_eq!(result.unwrap_err().code(), ErrorCode::InvalidFilename);
}

#[test]
fn test_case_sensitive_extension() {
    let (result, _base) = check(&[Raw::File("0_0.IN", b"1"), Raw::File("0_0.out", b"1")]);
    assert_eq!(result.unwrap_err().code(), ErrorCode::InvalidFilename);
}

#[test]
fn test_oversized_entry_rejected() {
    let limits = IngestLimits {
        max_entry_bytes: 8,
        ..IngestLimits::default()
    };
    let (result, base) = check_with(
        &[Raw::File("0_0.in", &[b'x'; 64]), Raw::File("0_0.out", b"1")],
        limits,
    );
    assert_eq!(result.unwrap_err().code(), ErrorCode::LimitExceeded);
    assert_nothing_written(&base);
}

#[test]
fn test_decompression_bomb_rejected() {
    let limits = IngestLimits {
        max_decode_bytes: 16 * 1024,
        ..IngestLimits::default()
    };
    let zeros = vec![0u8; 1024 * 1024];
    let (result, base) = check_with(
        &[Raw::File("0_0.in", &zeros), Raw::File("0_0.out", b"1")],
        limits,
    );
    let err = result.unwrap_err();
    assert_eq!(err.code(), ErrorCode::LimitExceeded);
    assert!(err.to_string().contains("LimitDecodeBytes"), "{}", err);
    assert_nothing_written(&base);
}

fn build_bytes(archive: &[u8]) -> (Result<(), IngestError>, tempfile::TempDir) {
    let base = tempfile::tempdir().unwrap();
    let builder = BundleBuilder::new(IngestConfig::default().with_scratch_dir(base.path()));
    let result = builder
        .build("t.tar.gz", archive, &one_group(), &CancellationToken::new())
        .map(|_| ());
    (result, base)
}

#[test]
fn test_corrupt_gzip_checksum_rejected() {
    let mut archive = build(&[Raw::File("0_0.in", b"1"), Raw::File("0_0.out", b"1")]);
    // First byte of the CRC32 in the gzip trailer.
    let crc = archive.len() - 8;
    archive[crc] ^= 0x01;

    let (result, base) = build_bytes(&archive);
    let err = result.unwrap_err();
    assert_eq!(err.code(), ErrorCode::MalformedArchive);
    assert_eq!(err.class(), ErrorClass::Integrity);
    assert_nothing_written(&base);
}

#[test]
fn test_bytes_after_gzip_stream_rejected() {
    let mut archive = build(&[Raw::File("0_0.in", b"1"), Raw::File("0_0.out", b"1")]);
    archive.extend_from_slice(b"GARBAGE-TRAILING-BYTES");

    let (result, base) = build_bytes(&archive);
    assert_eq!(result.unwrap_err().code(), ErrorCode::MalformedArchive);
    assert_nothing_written(&base);
}
