use runlet_metadata::{NewScript, SqliteStore};
use tempfile::TempDir;

/// A fresh SQLite store in a temp dir that lives as long as the returned guard.
pub async fn sqlite_store() -> (SqliteStore, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("metadata.db"), None)
        .await
        .unwrap();
    (store, dir)
}

pub fn new_script(owner_id: i64, scope: &str, name: &str) -> NewScript {
    NewScript {
        owner_id,
        scope: scope.to_string(),
        name: name.to_string(),
    }
}
