//! Asset storage for filevault.
//!
//! This module provides:
//! - Storage paths, folders, documents and images with their repositories
//! - Folder path resolution over the folder edge set
//! - Storage path quota accounting
//! - Chunked, progress-reporting file writes
//! - Resized WebP variant generation
//! - `AssetService`, which ties the pieces together

mod derivative;
mod document;
mod folder;
mod image;
mod quota;
mod resolver;
mod service;
mod storage_path;
mod writer;

pub use derivative::{
    decode, DecodedImage, DerivativeOutcome, DerivativePipeline, ImageOptions, ProgressPlan,
};
pub use document::{Document, DocumentRepository, NewDocument};
pub use folder::{Folder, FolderEdge, FolderRepository, FolderUpdate, NewFolder};
pub use image::{
    variant_filename, Image, ImageRepository, ImageVariant, NewImage, NewImageVariant,
    VariantSize,
};
pub use quota::QuotaAccountant;
pub use resolver::{FolderGraph, PathResolver};
pub use service::{
    AssetService, FolderContents, ImageUpload, StoragePathDetails, Upload,
};
pub use storage_path::{NewStoragePath, StoragePath, StoragePathRepository};
pub use writer::{ChunkedWriter, DEFAULT_CHUNK_SIZE};

use crate::{Result, VaultError};

/// Split a filename at its last `.` into base name and extension.
pub fn split_filename(filename: &str) -> Result<(String, String)> {
    match filename.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() && !ext.is_empty() => {
            Ok((base.to_string(), ext.to_string()))
        }
        _ => Err(VaultError::Validation(format!(
            "filename has no extension: {filename}"
        ))),
    }
}
