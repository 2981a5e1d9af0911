//! SqliteBundleRepository: SQLite-backed problem registry and bundle history.
//!
//! Provides:
//! - Problem registration and lookup
//! - Atomic, version-checked bundle appends
//! - Read access to the full version history

use crate::error::StoreError;
use crate::schema::BUNDLE_SCHEMA;
use chrono::{DateTime, Utc};
use judge_bundle::{Bundle, Group, ProblemId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A registered problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemRecord {
    pub id: ProblemId,
    pub title: String,
    /// `None` until the first bundle is stored.
    pub current_bundle_version: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// A bundle version as persisted, with its insertion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBundle {
    pub bundle: Bundle,
    pub created_at: DateTime<Utc>,
}

/// SQLite-backed bundle repository.
#[derive(Clone)]
pub struct SqliteBundleRepository {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteBundleRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBundleRepository").finish_non_exhaustive()
    }
}

impl SqliteBundleRepository {
    /// Open a file-backed store, creating the schema if needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    /// Create store from an existing connection.
    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> Result<(), StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()));
        conn.execute_batch(BUNDLE_SCHEMA)?;
        Ok(())
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Register a new problem and return its id.
    pub fn create_problem(&self, title: &str) -> Result<ProblemId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO problems (title, created_at) VALUES (?1, ?2)",
            params![title, Utc::now().to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(problem_id = id, title, "registered problem");
        Ok(id)
    }

    pub fn get_problem(&self, problem_id: ProblemId) -> Result<Option<ProblemRecord>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, title, current_bundle_version, created_at
                 FROM problems WHERE id = ?1",
                params![problem_id],
                |row| {
                    Ok((
                        row.get::<_, ProblemId>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<u32>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, title, current_bundle_version, created_at)| {
            Ok(ProblemRecord {
                id,
                title,
                current_bundle_version,
                created_at: parse_timestamp(&created_at, id, 0)?,
            })
        })
        .transpose()
    }

    /// Delete a problem and, via cascade, its bundle history.
    pub fn delete_problem(&self, problem_id: ProblemId) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM problems WHERE id = ?1", params![problem_id])?;
        Ok(n > 0)
    }

    /// All stored versions of a problem's bundle, oldest first.
    pub fn list_bundle_versions(
        &self,
        problem_id: ProblemId,
    ) -> Result<Vec<StoredBundle>, StoreError> {
        let conn = self.lock()?;
        ensure_problem(&conn, problem_id)?;

        let mut stmt = conn.prepare(
            "SELECT version, object_key, content_hash, groups_json, created_at
             FROM testcase_bundles WHERE problem_id = ?1 ORDER BY version ASC",
        )?;
        let rows = stmt.query_map(params![problem_id], BundleRow::from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_stored(problem_id)?);
        }
        Ok(out)
    }

    /// One specific version, or `None` if it was never stored.
    pub fn get_bundle_version(
        &self,
        problem_id: ProblemId,
        version: u32,
    ) -> Result<Option<StoredBundle>, StoreError> {
        let conn = self.lock()?;
        ensure_problem(&conn, problem_id)?;
        load_version(&conn, problem_id, version)
    }

    /// Current bundle as pointed to by the problem row.
    pub(crate) fn current_bundle_sync(
        &self,
        problem_id: ProblemId,
    ) -> Result<Option<Bundle>, StoreError> {
        let conn = self.lock()?;
        let Some(current) = current_version(&conn, problem_id)? else {
            return Ok(None);
        };
        let stored = load_version(&conn, problem_id, current)?.ok_or_else(|| {
            StoreError::Corrupt {
                problem_id,
                version: current,
                reason: "current version has no bundle row".to_string(),
            }
        })?;
        Ok(Some(stored.bundle))
    }
}

/// Current version pointer; `ProblemNotFound` when the problem row is missing.
pub(crate) fn current_version(
    conn: &Connection,
    problem_id: ProblemId,
) -> Result<Option<u32>, StoreError> {
    conn.query_row(
        "SELECT current_bundle_version FROM problems WHERE id = ?1",
        params![problem_id],
        |row| row.get::<_, Option<u32>>(0),
    )
    .optional()?
    .ok_or(StoreError::ProblemNotFound { problem_id })
}

fn ensure_problem(conn: &Connection, problem_id: ProblemId) -> Result<(), StoreError> {
    current_version(conn, problem_id).map(|_| ())
}

fn load_version(
    conn: &Connection,
    problem_id: ProblemId,
    version: u32,
) -> Result<Option<StoredBundle>, StoreError> {
    let row = conn
        .query_row(
            "SELECT version, object_key, content_hash, groups_json, created_at
             FROM testcase_bundles WHERE problem_id = ?1 AND version = ?2",
            params![problem_id, version],
            BundleRow::from_row,
        )
        .optional()?;
    row.map(|r| r.into_stored(problem_id)).transpose()
}

struct BundleRow {
    version: u32,
    object_key: String,
    content_hash: String,
    groups_json: String,
    created_at: String,
}

impl BundleRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            version: row.get(0)?,
            object_key: row.get(1)?,
            content_hash: row.get(2)?,
            groups_json: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_stored(self, problem_id: ProblemId) -> Result<StoredBundle, StoreError> {
        let groups: Vec<Group> =
            serde_json::from_str(&self.groups_json).map_err(|e| StoreError::Corrupt {
                problem_id,
                version: self.version,
                reason: format!("groups_json: {}", e),
            })?;
        Ok(StoredBundle {
            created_at: parse_timestamp(&self.created_at, problem_id, self.version)?,
            bundle: Bundle {
                object_key: self.object_key,
                content_hash: self.content_hash,
                version: self.version,
                groups,
            },
        })
    }
}

fn parse_timestamp(
    raw: &str,
    problem_id: ProblemId,
    version: u32,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            problem_id,
            version,
            reason: format!("created_at '{}': {}", raw, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get_problem() {
        let store = SqliteBundleRepository::memory().unwrap();
        let id = store.create_problem("A + B").unwrap();

        let problem = store.get_problem(id).unwrap().unwrap();
        assert_eq!(problem.title, "A + B");
        assert_eq!(problem.current_bundle_version, None);
        assert!(store.get_problem(id + 1).unwrap().is_none());
    }

    #[test]
    fn test_history_of_unknown_problem() {
        let store = SqliteBundleRepository::memory().unwrap();
        assert!(store.list_bundle_versions(9).unwrap_err().is_not_found());
        assert!(store.get_bundle_version(9, 1).unwrap_err().is_not_found());
    }

    #[test]
    fn test_empty_history() {
        let store = SqliteBundleRepository::memory().unwrap();
        let id = store.create_problem("p").unwrap();
        assert!(store.list_bundle_versions(id).unwrap().is_empty());
        assert!(store.get_bundle_version(id, 1).unwrap().is_none());
        assert!(store.current_bundle_sync(id).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_groups_json_is_reported() {
        let store = SqliteBundleRepository::memory().unwrap();
        let id = store.create_problem("p").unwrap();
        {
            let conn = store.lock().unwrap();
            conn.execute(
                "INSERT INTO testcase_bundles
                 (problem_id, version, object_key, content_hash, groups_json, created_at)
                 VALUES (?1, 1, 'k', 'h', 'not json', ?2)",
                params![id, Utc::now().to_rfc3339()],
            )
            .unwrap();
        }
        let err = store.get_bundle_version(id, 1).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { version: 1, .. }));
    }
}
