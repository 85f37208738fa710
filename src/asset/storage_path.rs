//! Storage path records and repository.

use sqlx::SqlitePool;

use crate::{Result, VaultError};

/// A named root directory owned by one application, with an optional byte quota.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StoragePath {
    /// Unique storage path ID.
    pub id: i64,
    /// Owning application name.
    pub app_name: String,
    /// Root directory relative to the configured files root.
    pub path: String,
    /// Capacity in bytes (None for unlimited).
    #[sqlx(rename = "size_limit")]
    pub limit: Option<i64>,
    /// When the storage path was created.
    pub created_at: String,
    /// When the storage path was last updated.
    pub updated_at: String,
}

/// Data for creating or replacing a storage path.
#[derive(Debug, Clone)]
pub struct NewStoragePath {
    /// Owning application name.
    pub app_name: String,
    /// Root directory.
    pub path: String,
    /// Capacity in bytes.
    pub limit: Option<i64>,
}

impl NewStoragePath {
    /// Create a new unlimited storage path.
    pub fn new(app_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            path: path.into(),
            limit: None,
        }
    }

    /// Set the capacity limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

const SELECT_COLUMNS: &str = "SELECT id, app_name, path, size_limit, created_at, updated_at
     FROM storage_paths";

/// Repository for storage path operations.
pub struct StoragePathRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StoragePathRepository<'a> {
    /// Create a new StoragePathRepository with the given pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a storage path.
    ///
    /// Fails with `Conflict` when the application already owns this path.
    pub async fn create(&self, new: &NewStoragePath) -> Result<StoragePath> {
        if self.exists(&new.app_name, &new.path).await? {
            return Err(VaultError::Conflict(format!(
                "storage path {} for {}",
                new.path, new.app_name
            )));
        }

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO storage_paths (app_name, path, size_limit) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&new.app_name)
        .bind(&new.path)
        .bind(new.limit)
        .fetch_one(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound("storage path".to_string()))
    }

    /// Get a storage path by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<StoragePath>> {
        let storage_path =
            sqlx::query_as::<_, StoragePath>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(storage_path)
    }

    /// List storage paths owned by an application.
    pub async fn list_by_app(&self, app_name: &str) -> Result<Vec<StoragePath>> {
        let storage_paths = sqlx::query_as::<_, StoragePath>(&format!(
            "{SELECT_COLUMNS} WHERE app_name = ? ORDER BY id"
        ))
        .bind(app_name)
        .fetch_all(self.pool)
        .await?;

        Ok(storage_paths)
    }

    /// Check whether the application already owns this path.
    pub async fn exists(&self, app_name: &str, path: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM storage_paths WHERE app_name = ? AND path = ?)",
        )
        .bind(app_name)
        .bind(path)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Replace the application, path and limit of a storage path.
    pub async fn update(&self, id: i64, update: &NewStoragePath) -> Result<Option<StoragePath>> {
        let result = sqlx::query(
            "UPDATE storage_paths
             SET app_name = ?, path = ?, size_limit = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(&update.app_name)
        .bind(&update.path)
        .bind(update.limit)
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => VaultError::Conflict(
                format!("storage path {} for {}", update.path, update.app_name),
            ),
            other => other.into(),
        })?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    /// Sum the byte sizes of every live image and document under the storage path.
    pub async fn used_space(&self, id: i64) -> Result<i64> {
        let images: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(images.size), 0) FROM images
             JOIN folders ON images.folder_id = folders.id
             WHERE folders.storage_path_id = ? AND images.deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        let documents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(documents.size), 0) FROM documents
             JOIN folders ON documents.folder_id = folders.id
             WHERE folders.storage_path_id = ? AND documents.deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(images + documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = setup_db().await;
        let repo = StoragePathRepository::new(db.pool());

        let created = repo
            .create(&NewStoragePath::new("shop", "shop-assets/").with_limit(1000))
            .await
            .unwrap();

        assert_eq!(created.app_name, "shop");
        assert_eq!(created.path, "shop-assets/");
        assert_eq!(created.limit, Some(1000));

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn test_duplicate_app_path_conflicts() {
        let db = setup_db().await;
        let repo = StoragePathRepository::new(db.pool());

        repo.create(&NewStoragePath::new("shop", "a/")).await.unwrap();
        let result = repo.create(&NewStoragePath::new("shop", "a/")).await;
        assert!(matches!(result, Err(VaultError::Conflict(_))));

        // Same path under another application is fine.
        repo.create(&NewStoragePath::new("blog", "a/")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_clears_limit() {
        let db = setup_db().await;
        let repo = StoragePathRepository::new(db.pool());

        let created = repo
            .create(&NewStoragePath::new("shop", "a/").with_limit(10))
            .await
            .unwrap();

        let updated = repo
            .update(created.id, &NewStoragePath::new("shop", "b/"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.path, "b/");
        assert_eq!(updated.limit, None);

        assert!(repo
            .update(9999, &NewStoragePath::new("x", "y"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_by_app() {
        let db = setup_db().await;
        let repo = StoragePathRepository::new(db.pool());

        repo.create(&NewStoragePath::new("shop", "a/")).await.unwrap();
        repo.create(&NewStoragePath::new("shop", "b/")).await.unwrap();
        repo.create(&NewStoragePath::new("blog", "a/")).await.unwrap();

        let paths = repo.list_by_app("shop").await.unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].path, "a/");
    }

    #[tokio::test]
    async fn test_used_space_empty() {
        let db = setup_db().await;
        let repo = StoragePathRepository::new(db.pool());

        let created = repo.create(&NewStoragePath::new("shop", "a/")).await.unwrap();
        assert_eq!(repo.used_space(created.id).await.unwrap(), 0);
    }
}
