//! Document records and repository.

use sqlx::SqlitePool;

use crate::{Result, VaultError};

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Document {
    /// Unique document ID.
    pub id: i64,
    /// Containing folder.
    pub folder_id: i64,
    /// Base name without extension.
    pub name: String,
    /// Extension without the leading dot.
    pub extension: String,
    /// MIME type supplied by the uploader.
    pub mime_type: String,
    /// Size in bytes.
    pub size: i64,
    /// When the document was created.
    pub created_at: String,
    /// When the document was last updated.
    pub updated_at: String,
    /// When the document was soft deleted.
    pub deleted_at: Option<String>,
}

impl Document {
    /// The on-disk filename.
    pub fn filename(&self) -> String {
        format!("{}.{}", self.name, self.extension)
    }

    /// Check whether the document is soft deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Data for creating or replacing a document record.
#[derive(Debug, Clone)]
pub struct NewDocument {
    /// Containing folder.
    pub folder_id: i64,
    /// Base name.
    pub name: String,
    /// Extension.
    pub extension: String,
    /// MIME type.
    pub mime_type: String,
    /// Size in bytes.
    pub size: i64,
}

const SELECT_COLUMNS: &str =
    "SELECT id, folder_id, name, extension, mime_type, size, created_at, updated_at, deleted_at
     FROM documents";

/// Repository for document operations.
pub struct DocumentRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DocumentRepository<'a> {
    /// Create a new DocumentRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a document record.
    pub async fn create(&self, doc: &NewDocument) -> Result<Document> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO documents (folder_id, name, extension, mime_type, size)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(doc.folder_id)
        .bind(&doc.name)
        .bind(&doc.extension)
        .bind(&doc.mime_type)
        .bind(doc.size)
        .fetch_one(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound("document".to_string()))
    }

    /// Get a document by ID, including soft-deleted documents.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(doc)
    }

    /// List the live documents of a folder.
    pub async fn list_by_folder(&self, folder_id: i64) -> Result<Vec<Document>> {
        let docs = sqlx::query_as::<_, Document>(&format!(
            "{SELECT_COLUMNS} WHERE folder_id = ? AND deleted_at IS NULL ORDER BY name, id"
        ))
        .bind(folder_id)
        .fetch_all(self.pool)
        .await?;

        Ok(docs)
    }

    /// Check whether `(folder, name, extension)` is free.
    ///
    /// Soft-deleted documents still hold their name.
    pub async fn is_available(
        &self,
        folder_id: i64,
        name: &str,
        extension: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM documents
                WHERE folder_id = ? AND name = ? AND extension = ? AND id != ?)",
        )
        .bind(folder_id)
        .bind(name)
        .bind(extension)
        .bind(exclude_id.unwrap_or(0))
        .fetch_one(self.pool)
        .await?;

        Ok(!taken)
    }

    /// Replace the stored attributes of a document.
    pub async fn update(&self, id: i64, doc: &NewDocument) -> Result<Option<Document>> {
        let result = sqlx::query(
            "UPDATE documents
             SET folder_id = ?, name = ?, extension = ?, mime_type = ?, size = ?,
                 updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(doc.folder_id)
        .bind(&doc.name)
        .bind(&doc.extension)
        .bind(&doc.mime_type)
        .bind(doc.size)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    /// Soft delete a document.
    pub async fn soft_delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE documents SET deleted_at = datetime('now') WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Restore a soft-deleted document.
    pub async fn restore(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE documents SET deleted_at = NULL WHERE id = ? AND deleted_at IS NOT NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Permanently delete a document record.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
