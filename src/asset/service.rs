//! Asset orchestration.
//!
//! Every upload runs the same sequence: quota check, name check, folder path
//! resolution, then a chunked write (documents) or the derivative pipeline
//! (images), with progress pushed to the bus. Reads go through the resolved
//! path cache first.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{info, warn};

use super::derivative::{DerivativePipeline, ImageOptions};
use super::document::{Document, DocumentRepository, NewDocument};
use super::folder::{Folder, FolderRepository, FolderUpdate, NewFolder};
use super::image::{Image, ImageRepository, ImageVariant, NewImage, VariantSize};
use super::quota::QuotaAccountant;
use super::resolver::PathResolver;
use super::split_filename;
use super::storage_path::{NewStoragePath, StoragePath, StoragePathRepository};
use super::writer::ChunkedWriter;
use crate::cache::{CachedAsset, ResolvedPathCache, TtlCache};
use crate::config::Config;
use crate::db::Database;
use crate::progress::{AssetKind, ProgressBus, ProgressReporter};
use crate::{Result, VaultError};

/// An uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Destination folder.
    pub folder_id: i64,
    /// Filename including extension.
    pub filename: String,
    /// MIME type.
    pub mime_type: String,
    /// File contents.
    pub data: Vec<u8>,
}

/// An uploaded image with its processing options.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// The file itself.
    pub upload: Upload,
    /// Optional description.
    pub description: Option<String>,
    /// Generate resized variants.
    pub resizable: bool,
    /// WebP quality; the configured default when None.
    pub quality: Option<u8>,
}

/// A storage path with its usage and root folders.
#[derive(Debug, Clone)]
pub struct StoragePathDetails {
    /// The storage path.
    pub storage_path: StoragePath,
    /// Bytes in use.
    pub used_space: i64,
    /// Live root folders.
    pub root_folders: Vec<Folder>,
}

/// A folder with its direct contents.
#[derive(Debug, Clone)]
pub struct FolderContents {
    /// The folder.
    pub folder: Folder,
    /// Live child folders.
    pub children: Vec<Folder>,
    /// Live documents.
    pub documents: Vec<Document>,
    /// Live images.
    pub images: Vec<Image>,
}

/// Stores documents and images under storage paths.
#[derive(Clone)]
pub struct AssetService {
    db: Database,
    files_root: PathBuf,
    writer: ChunkedWriter,
    default_quality: u8,
    bus: Arc<ProgressBus>,
    paths: ResolvedPathCache,
}

impl AssetService {
    /// Create a service.
    pub fn new(
        db: Database,
        files_root: impl Into<PathBuf>,
        writer: ChunkedWriter,
        default_quality: u8,
        bus: Arc<ProgressBus>,
        paths: ResolvedPathCache,
    ) -> Self {
        Self {
            db,
            files_root: files_root.into(),
            writer,
            default_quality,
            bus,
            paths,
        }
    }

    /// Create a service from configuration.
    pub fn from_config(
        db: Database,
        config: &Config,
        bus: Arc<ProgressBus>,
        cache: Arc<dyn TtlCache>,
    ) -> Self {
        Self::new(
            db,
            &config.storage.files_root,
            ChunkedWriter::new(config.storage.chunk_size),
            config.images.default_quality,
            bus,
            ResolvedPathCache::new(cache, config.cache.path_ttl()),
        )
    }

    /// Get the database.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Get the progress bus.
    pub fn bus(&self) -> &Arc<ProgressBus> {
        &self.bus
    }

    /// Get the files root.
    pub fn files_root(&self) -> &Path {
        &self.files_root
    }

    fn resolver(&self) -> PathResolver<'_> {
        PathResolver::new(self.db.pool(), &self.files_root)
    }

    // ---- storage paths ----

    /// Create a storage path.
    pub async fn create_storage_path(&self, new: &NewStoragePath) -> Result<StoragePath> {
        validate_storage_path(new)?;
        let storage_path = StoragePathRepository::new(self.db.pool()).create(new).await?;
        info!(
            id = storage_path.id,
            app = %storage_path.app_name,
            path = %storage_path.path,
            "Storage path created"
        );
        Ok(storage_path)
    }

    /// Replace a storage path's application, root and limit.
    pub async fn update_storage_path(
        &self,
        id: i64,
        update: &NewStoragePath,
    ) -> Result<StoragePath> {
        validate_storage_path(update)?;
        StoragePathRepository::new(self.db.pool())
            .update(id, update)
            .await?
            .ok_or_else(|| VaultError::NotFound("storage path".to_string()))
    }

    /// Get a storage path with its usage and root folders.
    pub async fn get_storage_path(&self, id: i64) -> Result<StoragePathDetails> {
        let storage_path = self.storage_path(id).await?;
        let used_space = QuotaAccountant::new(self.db.pool()).used_space(id).await?;
        let root_folders = FolderRepository::new(self.db.pool()).list_roots(id).await?;
        Ok(StoragePathDetails {
            storage_path,
            used_space,
            root_folders,
        })
    }

    /// List an application's storage paths.
    pub async fn list_storage_paths(&self, app_name: &str) -> Result<Vec<StoragePath>> {
        StoragePathRepository::new(self.db.pool())
            .list_by_app(app_name)
            .await
    }

    async fn storage_path(&self, id: i64) -> Result<StoragePath> {
        StoragePathRepository::new(self.db.pool())
            .get_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound("storage path".to_string()))
    }

    // ---- folders ----

    /// Create a folder, optionally under a parent.
    pub async fn create_folder(&self, new: &NewFolder) -> Result<Folder> {
        validate_segment(&new.name)?;
        self.storage_path(new.storage_path_id).await?;
        let folder = FolderRepository::new(self.db.pool()).create(new).await?;
        info!(id = folder.id, name = %folder.name, "Folder created");
        Ok(folder)
    }

    /// Update a folder's name or color.
    ///
    /// A rename moves the folder's directory on disk when it exists.
    pub async fn update_folder(&self, id: i64, update: &FolderUpdate) -> Result<Folder> {
        let folders = FolderRepository::new(self.db.pool());
        let (folder, storage_path) = self.folder_location(id).await?;

        let rename = match &update.name {
            Some(name) if *name != folder.name => Some(name.as_str()),
            _ => None,
        };

        let Some(new_name) = rename else {
            return folders
                .update(id, update)
                .await?
                .ok_or_else(|| VaultError::NotFound("folder".to_string()));
        };

        validate_segment(new_name)?;
        if folder.immutable {
            return Err(VaultError::Validation(format!(
                "folder {} cannot be renamed",
                folder.name
            )));
        }
        let parent = folders.parent_of(id).await?;
        if !folders
            .name_available(folder.storage_path_id, parent, new_name, Some(id))
            .await?
        {
            return Err(VaultError::Conflict(format!("folder {new_name}")));
        }

        let old_dir = self.resolver().resolve(&storage_path, id).await?;
        let new_dir = old_dir.with_file_name(new_name);
        let moved = fs::try_exists(&old_dir).await?;
        if moved {
            fs::rename(&old_dir, &new_dir).await?;
        }

        match folders.update(id, update).await {
            Ok(Some(updated)) => {
                info!(id, from = %folder.name, to = %new_name, "Folder renamed");
                Ok(updated)
            }
            result => {
                if moved {
                    if let Err(e) = fs::rename(&new_dir, &old_dir).await {
                        warn!("Failed to restore directory {}: {}", old_dir.display(), e);
                    }
                }
                result?.ok_or_else(|| VaultError::NotFound("folder".to_string()))
            }
        }
    }

    /// Soft delete a folder.
    pub async fn delete_folder(&self, id: i64) -> Result<()> {
        if !FolderRepository::new(self.db.pool()).soft_delete(id).await? {
            return Err(VaultError::NotFound("folder".to_string()));
        }
        Ok(())
    }

    /// Restore a soft-deleted folder.
    pub async fn restore_folder(&self, id: i64) -> Result<()> {
        if !FolderRepository::new(self.db.pool()).restore(id).await? {
            return Err(VaultError::NotFound("deleted folder".to_string()));
        }
        Ok(())
    }

    /// Get a folder with its children and assets.
    pub async fn get_folder(&self, id: i64) -> Result<FolderContents> {
        let folders = FolderRepository::new(self.db.pool());
        let folder = folders
            .get_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound("folder".to_string()))?;

        Ok(FolderContents {
            children: folders.list_children(id).await?,
            documents: DocumentRepository::new(self.db.pool())
                .list_by_folder(id)
                .await?,
            images: ImageRepository::new(self.db.pool())
                .list_by_folder(id)
                .await?,
            folder,
        })
    }

    async fn folder_location(&self, folder_id: i64) -> Result<(Folder, StoragePath)> {
        let folder = FolderRepository::new(self.db.pool())
            .get_by_id(folder_id)
            .await?
            .ok_or_else(|| VaultError::NotFound("folder".to_string()))?;
        let storage_path = self.storage_path(folder.storage_path_id).await?;
        Ok((folder, storage_path))
    }

    /// Locate a live folder and check that its storage path has capacity.
    async fn upload_target(&self, folder_id: i64) -> Result<StoragePath> {
        let (folder, storage_path) = self.folder_location(folder_id).await?;
        if folder.is_deleted() {
            return Err(VaultError::NotFound("folder".to_string()));
        }
        QuotaAccountant::new(self.db.pool())
            .ensure_capacity(&storage_path)
            .await?;
        Ok(storage_path)
    }

    // ---- documents ----

    /// Store a new document.
    pub async fn create_document(&self, upload: &Upload) -> Result<Document> {
        let storage_path = self.upload_target(upload.folder_id).await?;
        let (name, extension) = split_upload_name(&upload.filename)?;

        let documents = DocumentRepository::new(self.db.pool());
        if !documents
            .is_available(upload.folder_id, &name, &extension, None)
            .await?
        {
            return Err(VaultError::Conflict(format!("document {}", upload.filename)));
        }

        let dir = self.resolver().resolve(&storage_path, upload.folder_id).await?;
        let reporter = self.reporter(&storage_path, AssetKind::Document, &upload.filename);
        self.writer
            .write(&dir, &upload.filename, &upload.data, &reporter)
            .await?;

        let document = documents
            .create(&NewDocument {
                folder_id: upload.folder_id,
                name,
                extension,
                mime_type: upload.mime_type.clone(),
                size: upload.data.len() as i64,
            })
            .await?;

        info!(id = document.id, file = %upload.filename, bytes = document.size, "Document stored");
        Ok(document)
    }

    /// Replace a document's contents and attributes.
    pub async fn update_document(&self, id: i64, upload: &Upload) -> Result<Document> {
        let documents = DocumentRepository::new(self.db.pool());
        let existing = documents
            .get_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound("document".to_string()))?;

        let storage_path = self.upload_target(upload.folder_id).await?;
        let (name, extension) = split_upload_name(&upload.filename)?;
        if !documents
            .is_available(upload.folder_id, &name, &extension, Some(id))
            .await?
        {
            return Err(VaultError::Conflict(format!("document {}", upload.filename)));
        }

        let old_path = self.asset_dir(existing.folder_id).await?.join(existing.filename());
        remove_if_exists(&old_path).await?;

        let dir = self.resolver().resolve(&storage_path, upload.folder_id).await?;
        let reporter = self.reporter(&storage_path, AssetKind::Document, &upload.filename);
        self.writer
            .write(&dir, &upload.filename, &upload.data, &reporter)
            .await?;

        let document = documents
            .update(
                id,
                &NewDocument {
                    folder_id: upload.folder_id,
                    name,
                    extension,
                    mime_type: upload.mime_type.clone(),
                    size: upload.data.len() as i64,
                },
            )
            .await?
            .ok_or_else(|| VaultError::NotFound("document".to_string()))?;

        self.paths.invalidate(CachedAsset::Document(id));
        info!(id, file = %upload.filename, "Document replaced");
        Ok(document)
    }

    /// Soft delete a document.
    pub async fn delete_document(&self, id: i64) -> Result<()> {
        if !DocumentRepository::new(self.db.pool()).soft_delete(id).await? {
            return Err(VaultError::NotFound("document".to_string()));
        }
        self.paths.invalidate(CachedAsset::Document(id));
        Ok(())
    }

    /// Restore a soft-deleted document.
    pub async fn restore_document(&self, id: i64) -> Result<()> {
        if !DocumentRepository::new(self.db.pool()).restore(id).await? {
            return Err(VaultError::NotFound("deleted document".to_string()));
        }
        Ok(())
    }

    /// Permanently remove a document record and then its file.
    pub async fn destroy_document(&self, id: i64) -> Result<()> {
        let documents = DocumentRepository::new(self.db.pool());
        let document = documents
            .get_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound("document".to_string()))?;
        let path = self.asset_dir(document.folder_id).await?.join(document.filename());

        documents.delete(id).await?;
        self.paths.invalidate(CachedAsset::Document(id));
        remove_if_exists(&path).await?;

        info!(id, path = %path.display(), "Document destroyed");
        Ok(())
    }

    /// Resolve the file path of a live document.
    pub async fn document_path(&self, id: i64) -> Result<PathBuf> {
        let key = CachedAsset::Document(id);
        if let Some(path) = self.paths.get(key) {
            return Ok(path);
        }

        let document = DocumentRepository::new(self.db.pool())
            .get_by_id(id)
            .await?
            .filter(|d| !d.is_deleted())
            .ok_or_else(|| VaultError::NotFound("document".to_string()))?;

        let path = self.asset_dir(document.folder_id).await?.join(document.filename());
        self.paths.put(key, &path);
        Ok(path)
    }

    // ---- images ----

    /// Store a new image and its resized variants.
    pub async fn create_image(&self, upload: &ImageUpload) -> Result<(Image, Vec<ImageVariant>)> {
        let file = &upload.upload;
        let storage_path = self.upload_target(file.folder_id).await?;
        let (name, extension) = split_upload_name(&file.filename)?;

        let images = ImageRepository::new(self.db.pool());
        if !images
            .is_available(file.folder_id, &name, &extension, None)
            .await?
        {
            return Err(VaultError::Conflict(format!("image {}", file.filename)));
        }

        let dir = self.resolver().resolve(&storage_path, file.folder_id).await?;
        let reporter = self.reporter(&storage_path, AssetKind::Image, &file.filename);
        let outcome = DerivativePipeline::new(self.writer)
            .process(&dir, &name, &extension, &file.data, self.options(upload), &reporter)
            .await?;

        let image = images
            .create(
                &NewImage {
                    folder_id: file.folder_id,
                    name,
                    extension,
                    mime_type: file.mime_type.clone(),
                    size: file.data.len() as i64,
                    width: outcome.width,
                    height: outcome.height,
                    description: upload.description.clone(),
                },
                &outcome.variants,
            )
            .await?;
        let variants = images.list_variants(image.id).await?;

        info!(
            id = image.id,
            file = %file.filename,
            variants = variants.len(),
            "Image stored"
        );
        Ok((image, variants))
    }

    /// Replace an image, regenerating its variants.
    pub async fn update_image(
        &self,
        id: i64,
        upload: &ImageUpload,
    ) -> Result<(Image, Vec<ImageVariant>)> {
        let images = ImageRepository::new(self.db.pool());
        let existing = images
            .get_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound("image".to_string()))?;
        let old_variants = images.list_variants(id).await?;

        let file = &upload.upload;
        let storage_path = self.upload_target(file.folder_id).await?;
        let (name, extension) = split_upload_name(&file.filename)?;
        if !images
            .is_available(file.folder_id, &name, &extension, Some(id))
            .await?
        {
            return Err(VaultError::Conflict(format!("image {}", file.filename)));
        }

        let old_dir = self.asset_dir(existing.folder_id).await?;
        remove_if_exists(&old_dir.join(existing.filename())).await?;
        for variant in &old_variants {
            remove_if_exists(&old_dir.join(existing.variant_filename(variant.size))).await?;
        }

        let dir = self.resolver().resolve(&storage_path, file.folder_id).await?;
        let reporter = self.reporter(&storage_path, AssetKind::Image, &file.filename);
        let outcome = DerivativePipeline::new(self.writer)
            .process(&dir, &name, &extension, &file.data, self.options(upload), &reporter)
            .await?;

        let image = images
            .update(
                id,
                &NewImage {
                    folder_id: file.folder_id,
                    name,
                    extension,
                    mime_type: file.mime_type.clone(),
                    size: file.data.len() as i64,
                    width: outcome.width,
                    height: outcome.height,
                    description: upload.description.clone(),
                },
                &outcome.variants,
            )
            .await?
            .ok_or_else(|| VaultError::NotFound("image".to_string()))?;
        let variants = images.list_variants(id).await?;

        self.paths.invalidate_image(id);
        info!(id, file = %file.filename, variants = variants.len(), "Image replaced");
        Ok((image, variants))
    }

    /// Soft delete an image.
    pub async fn delete_image(&self, id: i64) -> Result<()> {
        if !ImageRepository::new(self.db.pool()).soft_delete(id).await? {
            return Err(VaultError::NotFound("image".to_string()));
        }
        self.paths.invalidate_image(id);
        Ok(())
    }

    /// Restore a soft-deleted image.
    pub async fn restore_image(&self, id: i64) -> Result<()> {
        if !ImageRepository::new(self.db.pool()).restore(id).await? {
            return Err(VaultError::NotFound("deleted image".to_string()));
        }
        Ok(())
    }

    /// Resolve the file path of a live image or one of its variants.
    pub async fn image_path(&self, id: i64, variant: Option<VariantSize>) -> Result<PathBuf> {
        let key = CachedAsset::Image(id, variant);
        if let Some(path) = self.paths.get(key) {
            return Ok(path);
        }

        let images = ImageRepository::new(self.db.pool());
        let image = images
            .get_by_id(id)
            .await?
            .filter(|i| !i.is_deleted())
            .ok_or_else(|| VaultError::NotFound("image".to_string()))?;

        let filename = match variant {
            None => image.filename(),
            Some(size) => {
                if !images.list_variants(id).await?.iter().any(|v| v.size == size) {
                    return Err(VaultError::NotFound(format!("image variant {size}")));
                }
                image.variant_filename(size)
            }
        };

        let path = self.asset_dir(image.folder_id).await?.join(filename);
        self.paths.put(key, &path);
        Ok(path)
    }

    // ---- helpers ----

    async fn asset_dir(&self, folder_id: i64) -> Result<PathBuf> {
        let (_, storage_path) = self.folder_location(folder_id).await?;
        self.resolver().resolve(&storage_path, folder_id).await
    }

    fn reporter(
        &self,
        storage_path: &StoragePath,
        kind: AssetKind,
        filename: &str,
    ) -> ProgressReporter {
        ProgressReporter::new(
            Arc::clone(&self.bus),
            storage_path.app_name.clone(),
            kind,
            filename,
        )
    }

    fn options(&self, upload: &ImageUpload) -> ImageOptions {
        ImageOptions {
            resizable: upload.resizable,
            quality: upload.quality.unwrap_or(self.default_quality),
        }
    }
}

impl std::fmt::Debug for AssetService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetService")
            .field("files_root", &self.files_root)
            .field("chunk_size", &self.writer.chunk_size())
            .finish()
    }
}

/// Reject names that would escape their directory.
fn validate_segment(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(VaultError::Validation(format!("invalid name: {name:?}")));
    }
    Ok(())
}

fn validate_storage_path(new: &NewStoragePath) -> Result<()> {
    if new.app_name.trim().is_empty() {
        return Err(VaultError::Validation("app name is required".to_string()));
    }
    if new.path.trim_matches('/').is_empty() || new.path.split('/').any(|s| s == "..") {
        return Err(VaultError::Validation(format!(
            "invalid storage path: {:?}",
            new.path
        )));
    }
    if new.limit.is_some_and(|limit| limit < 0) {
        return Err(VaultError::Validation("limit must not be negative".to_string()));
    }
    Ok(())
}

fn split_upload_name(filename: &str) -> Result<(String, String)> {
    validate_segment(filename)?;
    split_filename(filename)
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
