//! Storage path quota accounting.
//!
//! Usage is read from the database on every check. Two uploads racing on the
//! same storage path can both pass before either is recorded, so the limit
//! is a soft bound.

use sqlx::SqlitePool;
use tracing::debug;

use super::storage_path::{StoragePath, StoragePathRepository};
use crate::{Result, VaultError};

/// Computes used space and enforces the optional limit of a storage path.
pub struct QuotaAccountant<'a> {
    pool: &'a SqlitePool,
}

impl<'a> QuotaAccountant<'a> {
    /// Create a new QuotaAccountant with the given pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Bytes used by live images and documents under the storage path.
    pub async fn used_space(&self, storage_path_id: i64) -> Result<i64> {
        StoragePathRepository::new(self.pool)
            .used_space(storage_path_id)
            .await
    }

    /// Check whether the storage path can accept another upload.
    ///
    /// An unset limit always has capacity. Otherwise usage must be strictly
    /// below the limit; the size of the pending upload is not counted.
    pub async fn has_capacity(&self, storage_path: &StoragePath) -> Result<bool> {
        let Some(limit) = storage_path.limit else {
            return Ok(true);
        };
        let used = self.used_space(storage_path.id).await?;
        Ok(used < limit)
    }

    /// Fail with `CapacityExceeded` when the storage path is full.
    pub async fn ensure_capacity(&self, storage_path: &StoragePath) -> Result<()> {
        let Some(limit) = storage_path.limit else {
            return Ok(());
        };

        let used = self.used_space(storage_path.id).await?;
        debug!(storage_path_id = storage_path.id, used, limit, "Quota check");

        if used < limit {
            Ok(())
        } else {
            Err(VaultError::CapacityExceeded {
                storage_path_id: storage_path.id,
                used,
                limit,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{
        DocumentRepository, FolderRepository, NewDocument, NewFolder, NewStoragePath,
    };
    use crate::Database;

    async fn setup(limit: Option<i64>) -> (Database, StoragePath, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let mut new = NewStoragePath::new("shop", "shop/");
        new.limit = limit;
        let sp = StoragePathRepository::new(db.pool()).create(&new).await.unwrap();
        let folder = FolderRepository::new(db.pool())
            .create(&NewFolder::new(sp.id, "docs"))
            .await
            .unwrap();
        (db, sp, folder.id)
    }

    async fn add_document(db: &Database, folder_id: i64, name: &str, size: i64) {
        DocumentRepository::new(db.pool())
            .create(&NewDocument {
                folder_id,
                name: name.to_string(),
                extension: "bin".to_string(),
                mime_type: "application/octet-stream".to_string(),
                size,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unlimited_always_has_capacity() {
        let (db, sp, folder_id) = setup(None).await;
        let quota = QuotaAccountant::new(db.pool());

        assert!(quota.has_capacity(&sp).await.unwrap());
        add_document(&db, folder_id, "huge", i64::MAX / 2).await;
        assert!(quota.has_capacity(&sp).await.unwrap());
        quota.ensure_capacity(&sp).await.unwrap();
    }

    #[tokio::test]
    async fn test_limit_scenario() {
        let (db, sp, folder_id) = setup(Some(1000)).await;
        let quota = QuotaAccountant::new(db.pool());

        add_document(&db, folder_id, "a", 950).await;
        assert!(quota.has_capacity(&sp).await.unwrap());
        quota.ensure_capacity(&sp).await.unwrap();

        // The 80-byte upload passes the pre-write check and overshoots the limit.
        add_document(&db, folder_id, "b", 80).await;
        assert_eq!(quota.used_space(sp.id).await.unwrap(), 1030);
        assert!(!quota.has_capacity(&sp).await.unwrap());

        match quota.ensure_capacity(&sp).await {
            Err(VaultError::CapacityExceeded {
                storage_path_id,
                used,
                limit,
            }) => {
                assert_eq!(storage_path_id, sp.id);
                assert_eq!(used, 1030);
                assert_eq!(limit, 1000);
            }
            other => panic!("expected CapacityExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_usage_equal_to_limit_is_full() {
        let (db, sp, folder_id) = setup(Some(100)).await;
        let quota = QuotaAccountant::new(db.pool());

        add_document(&db, folder_id, "a", 100).await;
        assert!(!quota.has_capacity(&sp).await.unwrap());
    }
}
