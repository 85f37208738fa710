//! Error types for filevault.

use thiserror::Error;

/// Common error type for filevault.
#[derive(Error, Debug)]
pub enum VaultError {
    /// A folder's on-disk path could not be resolved from the folder graph.
    ///
    /// Raised for a missing root folder, a folder that belongs to another
    /// storage path, or a cycle in the edge set.
    #[error("path resolution error: {0}")]
    PathResolution(String),

    /// The storage path has no capacity left.
    #[error("storage path {storage_path_id} is full ({used} of {limit} bytes used)")]
    CapacityExceeded {
        /// Storage path that was checked.
        storage_path_id: i64,
        /// Bytes in use at check time.
        used: i64,
        /// Configured limit.
        limit: i64,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image bytes could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A resized image could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// Generating one of the resized variants failed; the whole set is aborted.
    #[error("derivative generation failed for {size}: {source}")]
    Derivative {
        /// Breakpoint label being generated.
        size: String,
        /// Underlying failure.
        #[source]
        source: Box<VaultError>,
    },

    /// Progress subscription handshake rejected.
    #[error("handshake error: {0}")]
    Handshake(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Validation error for caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl VaultError {
    /// Machine-readable code distinguishing the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::PathResolution(_) => "pathResolution",
            VaultError::CapacityExceeded { .. } => "storagePathFull",
            VaultError::Io(_) => "io",
            VaultError::Decode(_) => "decodeImage",
            VaultError::Encode(_) => "encodeImage",
            VaultError::Derivative { .. } => "convertImage",
            VaultError::Handshake(_) => "handshake",
            VaultError::Database(_) => "queryError",
            VaultError::NotFound(_) => "notFound",
            VaultError::Conflict(_) => "conflict",
            VaultError::Validation(_) => "validation",
            VaultError::Config(_) => "config",
        }
    }
}

impl From<sqlx::Error> for VaultError {
    fn from(e: sqlx::Error) -> Self {
        VaultError::Database(e.to_string())
    }
}

/// Result type alias for filevault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
