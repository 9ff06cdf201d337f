//! Shared fixtures for integration tests.

use std::sync::Arc;

use conduit_bus::database::{DatabaseConfig, DatabaseConnection, DatabasePath};
use conduit_bus::store::{SqliteStore, Store};

/// Builds a fresh `SQLite`-backed store over a leaked temp directory — the
/// `TempDir` guard must outlive the returned pool, so it is never dropped.
pub async fn test_store() -> Arc<dyn Store> {
    let (store, _path) = test_store_with_path().await;
    store
}

/// Like [`test_store`], but also returns the underlying `DatabasePath` so a
/// caller can reopen the same file in a fresh connection (crash-recovery
/// tests).
pub async fn test_store_with_path() -> (Arc<dyn Store>, DatabasePath) {
    let dir = tempfile::tempdir().unwrap();
    let path = DatabasePath::new(dir.path().join("test.db")).unwrap();
    std::mem::forget(dir);
    let conn = DatabaseConnection::initialize(DatabaseConfig::for_testing(path.clone()))
        .await
        .unwrap();
    (Arc::new(SqliteStore::new(conn)), path)
}
