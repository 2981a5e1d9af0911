//! SQLite schema for problems and their testcase bundle history.
//!
//! Tables:
//! - `problems`: Problem registry with a pointer to the current bundle
//! - `testcase_bundles`: Append-only bundle versions, one row per version

/// DDL for the bundle store.
///
/// Schema version: 1
pub const BUNDLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS problems (
    id                     INTEGER PRIMARY KEY AUTOINCREMENT,
    title                  TEXT NOT NULL,
    current_bundle_version INTEGER,
    created_at             TEXT NOT NULL
);

-- Bundle versions (immutable after insert)
CREATE TABLE IF NOT EXISTS testcase_bundles (
    problem_id   INTEGER NOT NULL REFERENCES problems(id) ON DELETE CASCADE,
    version      INTEGER NOT NULL CHECK (version >= 1),
    object_key   TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    groups_json  TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    PRIMARY KEY (problem_id, version)
);

CREATE INDEX IF NOT EXISTS idx_testcase_bundles_hash
    ON testcase_bundles(problem_id, content_hash);
"#;
