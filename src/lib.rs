//! filevault - asset storage service
//!
//! Stores documents and images for external applications under per-application
//! storage paths, enforces storage quotas, writes uploads in chunks while
//! streaming progress to subscribers, and generates resized WebP variants.

pub mod asset;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod progress;
pub mod web;

pub use asset::{
    AssetService, ChunkedWriter, DerivativePipeline, Document, Folder, Image, ImageUpload,
    PathResolver, QuotaAccountant, StoragePath, Upload, VariantSize,
};
pub use cache::{Caches, MemoryTtlCache, ResolvedPathCache, TtlCache};
pub use config::Config;
pub use db::Database;
pub use error::{Result, VaultError};
pub use progress::{HandshakeBroker, ProgressBus, ProgressEvent};
