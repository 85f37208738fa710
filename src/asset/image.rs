//! Image records, resized variants, and the image repository.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{Result, VaultError};

/// Breakpoint label of a resized image variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantSize {
    /// 600 px.
    Xs,
    /// 960 px.
    Sm,
    /// 1280 px.
    Md,
    /// 1920 px.
    Lg,
    /// 2560 px.
    Xl,
    /// 3840 px.
    Xxl,
}

impl VariantSize {
    /// Every breakpoint in ascending width order.
    pub const ALL: [VariantSize; 6] = [
        VariantSize::Xs,
        VariantSize::Sm,
        VariantSize::Md,
        VariantSize::Lg,
        VariantSize::Xl,
        VariantSize::Xxl,
    ];

    /// Target pixel width.
    pub fn width(self) -> u32 {
        match self {
            VariantSize::Xs => 600,
            VariantSize::Sm => 960,
            VariantSize::Md => 1280,
            VariantSize::Lg => 1920,
            VariantSize::Xl => 2560,
            VariantSize::Xxl => 3840,
        }
    }

    /// Label used in filenames, cache keys and the database.
    pub fn as_str(self) -> &'static str {
        match self {
            VariantSize::Xs => "xs",
            VariantSize::Sm => "sm",
            VariantSize::Md => "md",
            VariantSize::Lg => "lg",
            VariantSize::Xl => "xl",
            VariantSize::Xxl => "xxl",
        }
    }

    /// Breakpoints strictly narrower than `width`, ascending.
    pub fn below(width: u32) -> Vec<VariantSize> {
        Self::ALL
            .into_iter()
            .filter(|size| size.width() < width)
            .collect()
    }
}

impl fmt::Display for VariantSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariantSize {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "xs" => Ok(VariantSize::Xs),
            "sm" => Ok(VariantSize::Sm),
            "md" => Ok(VariantSize::Md),
            "lg" => Ok(VariantSize::Lg),
            "xl" => Ok(VariantSize::Xl),
            "xxl" => Ok(VariantSize::Xxl),
            _ => Err(VaultError::Validation(format!("unknown image size: {s}"))),
        }
    }
}

impl TryFrom<String> for VariantSize {
    type Error = VaultError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// A stored original image.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Image {
    /// Unique image ID.
    pub id: i64,
    /// Containing folder.
    pub folder_id: i64,
    /// Base name without extension.
    pub name: String,
    /// Extension without the leading dot.
    pub extension: String,
    /// MIME type supplied by the uploader.
    pub mime_type: String,
    /// Size of the original in bytes.
    pub size: i64,
    /// Original pixel width.
    pub width: i64,
    /// Original pixel height.
    pub height: i64,
    /// Optional description.
    pub description: Option<String>,
    /// When the image was created.
    pub created_at: String,
    /// When the image was last updated.
    pub updated_at: String,
    /// When the image was soft deleted.
    pub deleted_at: Option<String>,
}

impl Image {
    /// The on-disk filename of the original.
    pub fn filename(&self) -> String {
        format!("{}.{}", self.name, self.extension)
    }

    /// The on-disk filename of a resized variant.
    pub fn variant_filename(&self, size: VariantSize) -> String {
        variant_filename(&self.name, size)
    }

    /// Check whether the image is soft deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// `<base>-<label>.webp`
pub fn variant_filename(base: &str, size: VariantSize) -> String {
    format!("{base}-{size}.webp")
}

/// A resized rendition of an image.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ImageVariant {
    /// Unique variant ID.
    pub id: i64,
    /// Parent image.
    pub image_id: i64,
    /// Breakpoint label.
    #[sqlx(try_from = "String")]
    pub size: VariantSize,
    /// Measured pixel width.
    pub width: i64,
    /// Measured pixel height.
    pub height: i64,
}

/// A variant produced by the derivative pipeline, not yet stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewImageVariant {
    /// Breakpoint label.
    pub size: VariantSize,
    /// Measured pixel width.
    pub width: u32,
    /// Measured pixel height.
    pub height: u32,
}

/// Data for creating or replacing an image record.
#[derive(Debug, Clone)]
pub struct NewImage {
    /// Containing folder.
    pub folder_id: i64,
    /// Base name.
    pub name: String,
    /// Extension.
    pub extension: String,
    /// MIME type.
    pub mime_type: String,
    /// Size of the original in bytes.
    pub size: i64,
    /// Original pixel width.
    pub width: u32,
    /// Original pixel height.
    pub height: u32,
    /// Optional description.
    pub description: Option<String>,
}

const SELECT_COLUMNS: &str = "SELECT id, folder_id, name, extension, mime_type, size, width, height,
            description, created_at, updated_at, deleted_at
     FROM images";

/// Repository for image operations.
pub struct ImageRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ImageRepository<'a> {
    /// Create a new ImageRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an image record together with its variants.
    pub async fn create(&self, image: &NewImage, variants: &[NewImageVariant]) -> Result<Image> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO images (folder_id, name, extension, mime_type, size, width, height, description)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(image.folder_id)
        .bind(&image.name)
        .bind(&image.extension)
        .bind(&image.mime_type)
        .bind(image.size)
        .bind(i64::from(image.width))
        .bind(i64::from(image.height))
        .bind(&image.description)
        .fetch_one(&mut *tx)
        .await?;

        for variant in variants {
            insert_variant(&mut tx, id, variant).await?;
        }

        tx.commit().await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound("image".to_string()))
    }

    /// Get an image by ID, including soft-deleted images.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Image>> {
        let image = sqlx::query_as::<_, Image>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(image)
    }

    /// List the live images of a folder.
    pub async fn list_by_folder(&self, folder_id: i64) -> Result<Vec<Image>> {
        let images = sqlx::query_as::<_, Image>(&format!(
            "{SELECT_COLUMNS} WHERE folder_id = ? AND deleted_at IS NULL ORDER BY name, id"
        ))
        .bind(folder_id)
        .fetch_all(self.pool)
        .await?;

        Ok(images)
    }

    /// List the variants of an image, narrowest first.
    pub async fn list_variants(&self, image_id: i64) -> Result<Vec<ImageVariant>> {
        let mut variants = sqlx::query_as::<_, ImageVariant>(
            "SELECT id, image_id, size, width, height FROM image_variants WHERE image_id = ?",
        )
        .bind(image_id)
        .fetch_all(self.pool)
        .await?;

        variants.sort_by_key(|v| v.size);
        Ok(variants)
    }

    /// Check whether `(folder, name, extension)` is free.
    ///
    /// Soft-deleted images still hold their name.
    pub async fn is_available(
        &self,
        folder_id: i64,
        name: &str,
        extension: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM images
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

    /// Replace an image's attributes and its full variant set.
    pub async fn update(
        &self,
        id: i64,
        image: &NewImage,
        variants: &[NewImageVariant],
    ) -> Result<Option<Image>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE images
             SET folder_id = ?, name = ?, extension = ?, mime_type = ?, size = ?,
                 width = ?, height = ?, description = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(image.folder_id)
        .bind(&image.name)
        .bind(&image.extension)
        .bind(&image.mime_type)
        .bind(image.size)
        .bind(i64::from(image.width))
        .bind(i64::from(image.height))
        .bind(&image.description)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        sqlx::query("DELETE FROM image_variants WHERE image_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for variant in variants {
            insert_variant(&mut tx, id, variant).await?;
        }

        tx.commit().await?;

        self.get_by_id(id).await
    }

    /// Soft delete an image.
    pub async fn soft_delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE images SET deleted_at = datetime('now') WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Restore a soft-deleted image.
    pub async fn restore(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE images SET deleted_at = NULL WHERE id = ? AND deleted_at IS NOT NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

async fn insert_variant(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    image_id: i64,
    variant: &NewImageVariant,
) -> Result<()> {
    sqlx::query("INSERT INTO image_variants (image_id, size, width, height) VALUES (?, ?, ?, ?)")
        .bind(image_id)
        .bind(variant.size.as_str())
        .bind(i64::from(variant.width))
        .bind(i64::from(variant.height))
        .execute(&mut **tx)
        .await?;
    Ok(())
}
