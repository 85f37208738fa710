//! Folder types, the folder edge set, and the folder repository.

use sqlx::{QueryBuilder, SqlitePool};

use crate::{Result, VaultError};

/// A folder inside a storage path.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Folder {
    /// Unique folder ID.
    pub id: i64,
    /// Owning storage path.
    pub storage_path_id: i64,
    /// Display name, also used as the on-disk directory name.
    pub name: String,
    /// Display color.
    pub color: String,
    /// Immutable folders cannot be renamed.
    pub immutable: bool,
    /// When the folder was created.
    pub created_at: String,
    /// When the folder was last updated.
    pub updated_at: String,
    /// When the folder was soft deleted.
    pub deleted_at: Option<String>,
}

impl Folder {
    /// Check whether the folder is soft deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Data for creating a new folder.
#[derive(Debug, Clone)]
pub struct NewFolder {
    /// Owning storage path.
    pub storage_path_id: i64,
    /// Folder name.
    pub name: String,
    /// Display color.
    pub color: String,
    /// Whether the folder can be renamed.
    pub immutable: bool,
    /// Parent folder (None for a root folder).
    pub parent_id: Option<i64>,
}

impl NewFolder {
    /// Create a new root folder.
    pub fn new(storage_path_id: i64, name: impl Into<String>) -> Self {
        Self {
            storage_path_id,
            name: name.into(),
            color: String::new(),
            immutable: false,
            parent_id: None,
        }
    }

    /// Set the color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Set the parent folder.
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Mark the folder immutable.
    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }
}

/// Builder for updating a folder.
#[derive(Debug, Clone, Default)]
pub struct FolderUpdate {
    /// New folder name.
    pub name: Option<String>,
    /// New color.
    pub color: Option<String>,
}

impl FolderUpdate {
    /// Create a new FolderUpdate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the color.
    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.color.is_none()
    }
}

/// A parent/child association between two folders of one storage path.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FolderEdge {
    /// Storage path the edge belongs to.
    pub storage_path_id: i64,
    /// Child folder.
    pub folder_id: i64,
    /// Parent folder.
    pub parent_folder_id: i64,
    /// Name of the child folder.
    pub folder_name: String,
}

const SELECT_COLUMNS: &str =
    "SELECT id, storage_path_id, name, color, immutable, created_at, updated_at, deleted_at
     FROM folders";

/// Repository for folder operations.
pub struct FolderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FolderRepository<'a> {
    /// Create a new FolderRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new folder, recording its parent edge when one is given.
    ///
    /// The parent must belong to the same storage path, and the name must be
    /// unused among its siblings.
    pub async fn create(&self, folder: &NewFolder) -> Result<Folder> {
        if let Some(parent_id) = folder.parent_id {
            let parent = self
                .get_by_id(parent_id)
                .await?
                .ok_or_else(|| VaultError::NotFound("parent folder".to_string()))?;
            if parent.storage_path_id != folder.storage_path_id {
                return Err(VaultError::Validation(format!(
                    "parent folder {parent_id} belongs to another storage path"
                )));
            }
        }

        if !self
            .name_available(folder.storage_path_id, folder.parent_id, &folder.name, None)
            .await?
        {
            return Err(VaultError::Conflict(format!("folder {}", folder.name)));
        }

        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO folders (storage_path_id, name, color, immutable)
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(folder.storage_path_id)
        .bind(&folder.name)
        .bind(&folder.color)
        .bind(folder.immutable)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(parent_id) = folder.parent_id {
            sqlx::query(
                "INSERT INTO folder_edges (storage_path_id, folder_id, parent_folder_id)
                 VALUES (?, ?, ?)",
            )
            .bind(folder.storage_path_id)
            .bind(id)
            .bind(parent_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound("folder".to_string()))
    }

    /// Get a folder by ID, including soft-deleted folders.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(folder)
    }

    /// Get the parent of a folder (None for a root folder).
    pub async fn parent_of(&self, id: i64) -> Result<Option<i64>> {
        let parent: Option<i64> =
            sqlx::query_scalar("SELECT parent_folder_id FROM folder_edges WHERE folder_id = ?")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(parent)
    }

    /// Load every edge of a storage path together with the child folder names.
    pub async fn list_edges(&self, storage_path_id: i64) -> Result<Vec<FolderEdge>> {
        let edges = sqlx::query_as::<_, FolderEdge>(
            "SELECT e.storage_path_id, e.folder_id, e.parent_folder_id, f.name AS folder_name
             FROM folder_edges e
             JOIN folders f ON f.id = e.folder_id
             WHERE e.storage_path_id = ?",
        )
        .bind(storage_path_id)
        .fetch_all(self.pool)
        .await?;

        Ok(edges)
    }

    /// List the live root folders of a storage path.
    pub async fn list_roots(&self, storage_path_id: i64) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(&format!(
            "{SELECT_COLUMNS}
             WHERE storage_path_id = ? AND deleted_at IS NULL
               AND id NOT IN (SELECT folder_id FROM folder_edges)
             ORDER BY name, id"
        ))
        .bind(storage_path_id)
        .fetch_all(self.pool)
        .await?;

        Ok(folders)
    }

    /// List the live direct children of a folder.
    pub async fn list_children(&self, parent_id: i64) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(&format!(
            "{SELECT_COLUMNS}
             WHERE deleted_at IS NULL
               AND id IN (SELECT folder_id FROM folder_edges WHERE parent_folder_id = ?)
             ORDER BY name, id"
        ))
        .bind(parent_id)
        .fetch_all(self.pool)
        .await?;

        Ok(folders)
    }

    /// Check whether a name is free among the siblings under `parent_id`
    /// (or among the root folders of the storage path when `parent_id` is None).
    pub async fn name_available(
        &self,
        storage_path_id: i64,
        parent_id: Option<i64>,
        name: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool> {
        let taken: bool = match parent_id {
            Some(parent_id) => {
                sqlx::query_scalar(
                    "SELECT EXISTS(
                        SELECT 1 FROM folders f
                        JOIN folder_edges e ON e.folder_id = f.id
                        WHERE e.parent_folder_id = ? AND f.name = ? AND f.id != ?)",
                )
                .bind(parent_id)
                .bind(name)
                .bind(exclude_id.unwrap_or(0))
                .fetch_one(self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar(
                    "SELECT EXISTS(
                        SELECT 1 FROM folders
                        WHERE storage_path_id = ? AND name = ? AND id != ?
                          AND id NOT IN (SELECT folder_id FROM folder_edges))",
                )
                .bind(storage_path_id)
                .bind(name)
                .bind(exclude_id.unwrap_or(0))
                .fetch_one(self.pool)
                .await?
            }
        };

        Ok(!taken)
    }

    /// Update a folder's name or color.
    pub async fn update(&self, id: i64, update: &FolderUpdate) -> Result<Option<Folder>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE folders SET ");
        let mut separated = query.separated(", ");

        if let Some(ref name) = update.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name);
        }

        if let Some(ref color) = update.color {
            separated.push("color = ");
            separated.push_bind_unseparated(color);
        }

        separated.push("updated_at = datetime('now')");

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query.build().execute(self.pool).await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    /// Soft delete a folder.
    pub async fn soft_delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE folders SET deleted_at = datetime('now') WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Restore a soft-deleted folder.
    pub async fn restore(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE folders SET deleted_at = NULL WHERE id = ? AND deleted_at IS NOT NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{NewStoragePath, StoragePathRepository};
    use crate::Database;

    async fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let storage_path = StoragePathRepository::new(db.pool())
            .create(&NewStoragePath::new("shop", "shop/"))
            .await
            .unwrap();
        (db, storage_path.id)
    }

    #[tokio::test]
    async fn test_create_root_folder() {
        let (db, sp) = setup().await;
        let repo = FolderRepository::new(db.pool());

        let folder = repo
            .create(&NewFolder::new(sp, "products").with_color("#ff0000"))
            .await
            .unwrap();

        assert_eq!(folder.name, "products");
        assert_eq!(folder.color, "#ff0000");
        assert!(!folder.immutable);
        assert!(!folder.is_deleted());
        assert_eq!(repo.parent_of(folder.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_child_records_edge() {
        let (db, sp) = setup().await;
        let repo = FolderRepository::new(db.pool());

        let root = repo.create(&NewFolder::new(sp, "products")).await.unwrap();
        let child = repo
            .create(&NewFolder::new(sp, "shoes").with_parent(root.id))
            .await
            .unwrap();

        assert_eq!(repo.parent_of(child.id).await.unwrap(), Some(root.id));

        let edges = repo.list_edges(sp).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].folder_id, child.id);
        assert_eq!(edges[0].parent_folder_id, root.id);
        assert_eq!(edges[0].folder_name, "shoes");

        let roots = repo.list_roots(sp).await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, root.id);

        let children = repo.list_children(root.id).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, child.id);
    }

    #[tokio::test]
    async fn test_sibling_name_clash() {
        let (db, sp) = setup().await;
        let repo = FolderRepository::new(db.pool());

        let root = repo.create(&NewFolder::new(sp, "products")).await.unwrap();
        let result = repo.create(&NewFolder::new(sp, "products")).await;
        assert!(matches!(result, Err(VaultError::Conflict(_))));

        repo.create(&NewFolder::new(sp, "a").with_parent(root.id))
            .await
            .unwrap();
        let result = repo.create(&NewFolder::new(sp, "a").with_parent(root.id)).await;
        assert!(matches!(result, Err(VaultError::Conflict(_))));

        // Same name at a different level is fine.
        repo.create(&NewFolder::new(sp, "a")).await.unwrap();
    }

    #[tokio::test]
    async fn test_parent_from_other_storage_path() {
        let (db, sp) = setup().await;
        let other = StoragePathRepository::new(db.pool())
            .create(&NewStoragePath::new("blog", "blog/"))
            .await
            .unwrap();
        let repo = FolderRepository::new(db.pool());

        let root = repo.create(&NewFolder::new(sp, "products")).await.unwrap();
        let result = repo
            .create(&NewFolder::new(other.id, "x").with_parent(root.id))
            .await;
        assert!(matches!(result, Err(VaultError::Validation(_))));

        let result = repo.create(&NewFolder::new(sp, "x").with_parent(9999)).await;
        assert!(matches!(result, Err(VaultError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_folder() {
        let (db, sp) = setup().await;
        let repo = FolderRepository::new(db.pool());

        let folder = repo.create(&NewFolder::new(sp, "old")).await.unwrap();
        let updated = repo
            .update(folder.id, &FolderUpdate::new().name("new").color("blue"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "new");
        assert_eq!(updated.color, "blue");

        let unchanged = repo
            .update(folder.id, &FolderUpdate::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.name, "new");

        assert!(repo
            .update(9999, &FolderUpdate::new().name("x"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_name_available_excludes_self() {
        let (db, sp) = setup().await;
        let repo = FolderRepository::new(db.pool());

        let folder = repo.create(&NewFolder::new(sp, "docs")).await.unwrap();
        assert!(!repo.name_available(sp, None, "docs", None).await.unwrap());
        assert!(repo
            .name_available(sp, None, "docs", Some(folder.id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_soft_delete_and_restore() {
        let (db, sp) = setup().await;
        let repo = FolderRepository::new(db.pool());

        let folder = repo.create(&NewFolder::new(sp, "tmp")).await.unwrap();
        assert!(repo.soft_delete(folder.id).await.unwrap());
        assert!(!repo.soft_delete(folder.id).await.unwrap());

        let deleted = repo.get_by_id(folder.id).await.unwrap().unwrap();
        assert!(deleted.is_deleted());
        assert!(repo.list_roots(sp).await.unwrap().is_empty());

        assert!(repo.restore(folder.id).await.unwrap());
        assert!(!repo.restore(folder.id).await.unwrap());
        assert_eq!(repo.list_roots(sp).await.unwrap().len(), 1);
    }
}
