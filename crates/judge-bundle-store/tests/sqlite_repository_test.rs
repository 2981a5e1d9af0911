//! Version protocol against a real SQLite database.

use flate2::write::GzEncoder;
use flate2::Compression;
use judge_bundle::{
    BundleIngestor, BundleRepository, CancellationToken, DeclaredGroup, ErrorCode, IngestConfig,
    IngestRequest,
};
use judge_bundle_store::SqliteBundleRepository;

fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_path(path).unwrap();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn groups() -> Vec<DeclaredGroup> {
    vec![
        DeclaredGroup {
            order_id: 0,
            name: "samples".into(),
            points: 0,
        },
        DeclaredGroup {
            order_id: 1,
            name: "main".into(),
            points: 100,
        },
    ]
}

fn archive(answer: &[u8]) -> Vec<u8> {
    tar_gz(&[
        ("0_0.in", b"1 2\n"),
        ("0_0.out", b"3\n"),
        ("1_0.in", b"40 2\n"),
        ("1_0.out", answer),
    ])
}

async fn ingest(
    ingestor: &BundleIngestor<SqliteBundleRepository>,
    problem_id: i64,
    bytes: &[u8],
) -> Result<judge_bundle::IngestOutcome, judge_bundle::IngestError> {
    let groups = groups();
    let request = IngestRequest {
        problem_id,
        object_key: "tests.tar.gz",
        archive: bytes,
        groups: &groups,
    };
    ingestor.ingest(request, &CancellationToken::new()).await
}

#[tokio::test]
async fn test_version_history_through_ingestor() {
    let scratch = tempfile::tempdir().unwrap();
    let store = SqliteBundleRepository::memory().unwrap();
    let problem = store.create_problem("A + B").unwrap();
    let ingestor = BundleIngestor::new(
        store.clone(),
        IngestConfig::default().with_scratch_dir(scratch.path()),
    );

    let v1 = archive(b"42\n");
    let v2 = archive(b"42\r\n");

    assert_eq!(ingest(&ingestor, problem, &v1).await.unwrap().bundle().version, 1);
    let again = ingest(&ingestor, problem, &v1).await.unwrap();
    assert!(!again.is_created());
    assert_eq!(ingest(&ingestor, problem, &v2).await.unwrap().bundle().version, 2);
    // Going back to the first archive is a new version, not a rollback.
    assert_eq!(ingest(&ingestor, problem, &v1).await.unwrap().bundle().version, 3);

    let history = store.list_bundle_versions(problem).unwrap();
    let versions: Vec<u32> = history.iter().map(|s| s.bundle.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
    assert_eq!(history[0].bundle.content_hash, history[2].bundle.content_hash);
    assert_eq!(history[2].bundle.groups[1].testcases.len(), 1);

    let current = store.get_current_bundle(problem).await.unwrap().unwrap();
    assert_eq!(current, history[2].bundle);
    assert_eq!(
        store.get_problem(problem).unwrap().unwrap().current_bundle_version,
        Some(3)
    );
}

#[tokio::test]
async fn test_deleted_problem_is_persistence_conflict() {
    let scratch = tempfile::tempdir().unwrap();
    let store = SqliteBundleRepository::memory().unwrap();
    let problem = store.create_problem("gone").unwrap();
    let ingestor = BundleIngestor::new(
        store.clone(),
        IngestConfig::default().with_scratch_dir(scratch.path()),
    );

    assert!(store.delete_problem(problem).unwrap());
    let err = ingest(&ingestor, problem, &archive(b"42\n"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::PersistenceConflict);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_writers_on_separate_connections() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("bundles.db");
    let problem = SqliteBundleRepository::open(&db)
        .unwrap()
        .create_problem("race")
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..6u8 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let store = SqliteBundleRepository::open(&db).unwrap();
            let bundle = judge_bundle::Bundle {
                object_key: format!("writer-{}.tar.gz", i),
                content_hash: format!("{:064x}", i),
                version: 1,
                groups: vec![],
            };
            store.append_bundle_version(problem, &bundle).await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => wins += 1,
            Err(err) => assert!(err.is_conflict(), "unexpected error: {}", err),
        }
    }
    assert_eq!(wins, 1);

    let store = SqliteBundleRepository::open(&db).unwrap();
    assert_eq!(store.list_bundle_versions(problem).unwrap().len(), 1);
}

#[tokio::test]
async fn test_store_reopens_with_history() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("bundles.db");
    let scratch = tempfile::tempdir().unwrap();

    let problem = {
        let store = SqliteBundleRepository::open(&db).unwrap();
        let problem = store.create_problem("persisted").unwrap();
        let ingestor = BundleIngestor::new(
            store,
            IngestConfig::default().with_scratch_dir(scratch.path()),
        );
        ingest(&ingestor, problem, &archive(b"42\n")).await.unwrap();
        problem
    };

    let store = SqliteBundleRepository::open(&db).unwrap();
    let stored = store.get_bundle_version(problem, 1).unwrap().unwrap();
    assert_eq!(stored.bundle.object_key, "tests.tar.gz");
    assert_eq!(stored.bundle.groups.len(), 2);
}
