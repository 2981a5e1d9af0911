use crate::error::StoreError;
use crate::store::{current_version, SqliteBundleRepository};
use chrono::Utc;
use judge_bundle::{Bundle, ProblemId};
use rusqlite::{params, Connection};

impl SqliteBundleRepository {
    /// Append `bundle` as the new current version inside one IMMEDIATE transaction.
    ///
    /// The version check, the history insert and the pointer update either all
    /// commit or all roll back.
    pub fn append_bundle_version_sync(
        &self,
        problem_id: ProblemId,
        bundle: &Bundle,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute("BEGIN IMMEDIATE", [])?;
        let result = append_inner(&conn, problem_id, bundle);

        let result = result.and_then(|()| {
            conn.execute("COMMIT", [])?;
            Ok(())
        });
        // A failed COMMIT (deferred constraints, busy) leaves the transaction open.
        if result.is_err() && !conn.is_autocommit() {
            let _ = conn.execute("ROLLBACK", []);
        }

        result
    }
}

fn append_inner(conn: &Connection, problem_id: ProblemId, bundle: &Bundle) -> Result<(), StoreError> {
    let current = current_version(conn, problem_id)?;
    let conflict = || StoreError::VersionConflict {
        problem_id,
        attempted: bundle.version,
        current,
    };
    if current.unwrap_or(0).checked_add(1) != Some(bundle.version) {
        return Err(conflict());
    }

    let groups_json = serde_json::to_string(&bundle.groups).map_err(|e| StoreError::Corrupt {
        problem_id,
        version: bundle.version,
        reason: format!("serialize groups: {}", e),
    })?;

    let inserted = conn.execute(
        "INSERT INTO testcase_bundles
         (problem_id, version, object_key, content_hash, groups_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            problem_id,
            bundle.version,
            bundle.object_key,
            bundle.content_hash,
            groups_json,
            Utc::now().to_rfc3339(),
        ],
    );
    match inserted {
        Ok(_) => {}
        // A row for this version already exists: another writer got there first.
        Err(e) if e.to_string().contains("UNIQUE constraint failed") => return Err(conflict()),
        Err(e) => return Err(e.into()),
    }

    // Compare-and-swap on the pointer itself, in case the check above raced.
    let updated = conn.execute(
        "UPDATE problems SET current_bundle_version = ?1
         WHERE id = ?2 AND current_bundle_version IS ?3",
        params![bundle.version, problem_id, current],
    )?;
    if updated != 1 {
        return Err(conflict());
    }

    tracing::debug!(problem_id, version = bundle.version, "appended bundle row");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use judge_bundle::{Group, Testcase};

    fn bundle(version: u32, hash: &str) -> Bundle {
        Bundle {
            object_key: format!("problems/1/v{}.tar.gz", version),
            content_hash: hash.to_string(),
            version,
            groups: vec![Group {
                order_id: 0,
                name: "main".into(),
                points: 100,
                testcases: vec![Testcase { order_id: 0 }, Testcase { order_id: 1 }],
            }],
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let store = SqliteBundleRepository::memory().unwrap();
        let id = store.create_problem("p").unwrap();

        store.append_bundle_version_sync(id, &bundle(1, "aa")).unwrap();
        store.append_bundle_version_sync(id, &bundle(2, "bb")).unwrap();

        assert_eq!(store.current_bundle_sync(id).unwrap(), Some(bundle(2, "bb")));
        assert_eq!(
            store.get_problem(id).unwrap().unwrap().current_bundle_version,
            Some(2)
        );
        let history: Vec<u32> = store
            .list_bundle_versions(id)
            .unwrap()
            .iter()
            .map(|s| s.bundle.version)
            .collect();
        assert_eq!(history, vec![1, 2]);
        assert_eq!(
            store.get_bundle_version(id, 1).unwrap().unwrap().bundle,
            bundle(1, "aa")
        );
    }

    #[test]
    fn test_wrong_version_is_conflict() {
        let store = SqliteBundleRepository::memory().unwrap();
        let id = store.create_problem("p").unwrap();

        assert!(store
            .append_bundle_version_sync(id, &bundle(2, "aa"))
            .unwrap_err()
            .is_conflict());
        store.append_bundle_version_sync(id, &bundle(1, "aa")).unwrap();
        let err = store
            .append_bundle_version_sync(id, &bundle(1, "bb"))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                attempted: 1,
                current: Some(1),
                ..
            }
        ));
        assert_eq!(store.list_bundle_versions(id).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_problem() {
        let store = SqliteBundleRepository::memory().unwrap();
        assert!(store
            .append_bundle_version_sync(42, &bundle(1, "aa"))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_pointer_update_failure_rolls_back_insert() {
        let store = SqliteBundleRepository::memory().unwrap();
        let id = store.create_problem("p").unwrap();
        store
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER fail_pointer BEFORE UPDATE ON problems
                 BEGIN SELECT RAISE(ABORT, 'pointer update refused'); END;",
            )
            .unwrap();

        let err = store
            .append_bundle_version_sync(id, &bundle(1, "aa"))
            .unwrap_err();
        assert!(err.to_string().contains("pointer update refused"));

        // Neither half of the append is visible.
        assert!(store.list_bundle_versions(id).unwrap().is_empty());
        assert_eq!(
            store.get_problem(id).unwrap().unwrap().current_bundle_version,
            None
        );
    }

    #[test]
    fn test_commit_failure_rolls_back() {
        let store = SqliteBundleRepository::memory().unwrap();
        let id = store.create_problem("p").unwrap();
        // A deferred foreign key violation only surfaces at COMMIT.
        store
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TABLE audit (problem_id INTEGER
                     REFERENCES problems(id) DEFERRABLE INITIALLY DEFERRED);
                 CREATE TRIGGER audit_append AFTER INSERT ON testcase_bundles
                 BEGIN INSERT INTO audit VALUES (-1); END;",
            )
            .unwrap();

        let err = store
            .append_bundle_version_sync(id, &bundle(1, "aa"))
            .unwrap_err();
        assert!(err.to_string().contains("FOREIGN KEY"), "{}", err);
        assert!(store.lock().unwrap().is_autocommit());
        assert!(store.list_bundle_versions(id).unwrap().is_empty());

        store
            .lock()
            .unwrap()
            .execute_batch("DROP TRIGGER audit_append;")
            .unwrap();
        store.append_bundle_version_sync(id, &bundle(1, "aa")).unwrap();
        assert_eq!(store.list_bundle_versions(id).unwrap().len(), 1);
    }

    #[test]
    fn test_connection_usable_after_rollback() {
        let store = SqliteBundleRepository::memory().unwrap();
        let id = store.create_problem("p").unwrap();
        store
            .append_bundle_version_sync(id, &bundle(3, "aa"))
            .unwrap_err();
        store.append_bundle_version_sync(id, &bundle(1, "aa")).unwrap();
    }
}
