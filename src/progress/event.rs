//! Progress event payload.

use serde::{Deserialize, Serialize};

/// Kind of asset an upload is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// An image upload, including derivative generation.
    Image,
    /// A document upload.
    Document,
}

impl AssetKind {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Document => "document",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Percentage completion of one upload, as sent to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Owning application name.
    pub app: String,
    /// Asset kind.
    #[serde(rename = "type")]
    pub kind: AssetKind,
    /// Uploaded filename.
    pub filename: String,
    /// Completion in `[0, 100]`.
    pub progress: f64,
}
