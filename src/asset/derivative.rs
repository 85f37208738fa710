//! Resized WebP variant generation.
//!
//! The original is written first and owns a fixed share of the progress
//! range. The rest is split evenly across the variants actually generated.

use std::path::Path;
use std::sync::Arc;

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, info};

use super::image::{variant_filename, NewImageVariant, VariantSize};
use super::writer::ChunkedWriter;
use crate::progress::{NoProgress, ProgressSink, Scaled};
use crate::{Result, VaultError};

/// A decoded original image.
#[derive(Clone)]
pub struct DecodedImage {
    image: Arc<DynamicImage>,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Decode image bytes in any format the `image` crate recognizes.
pub fn decode(data: &[u8]) -> Result<DecodedImage> {
    let image = image::load_from_memory(data).map_err(|e| VaultError::Decode(e.to_string()))?;
    Ok(DecodedImage {
        width: image.width(),
        height: image.height(),
        image: Arc::new(image),
    })
}

/// Resize to `target_width`, keeping the aspect ratio, and encode as WebP.
fn render_variant(
    image: &DynamicImage,
    target_width: u32,
    quality: u8,
) -> Result<(Vec<u8>, u32, u32)> {
    let (width, height) = (image.width(), image.height());
    let target_height =
        ((f64::from(height) * f64::from(target_width) / f64::from(width)).round() as u32).max(1);

    let resized = image.resize_exact(target_width, target_height, FilterType::Lanczos3);
    let rgba = resized.to_rgba8();

    let encoded = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
        .encode_simple(false, f32::from(quality))
        .map_err(|e| VaultError::Encode(format!("{e:?}")))?;

    Ok((encoded.to_vec(), resized.width(), resized.height()))
}

/// How the progress range is divided for one image upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressPlan {
    /// Share reserved for writing the original.
    pub original_share: f64,
    /// Share of each generated variant.
    pub per_variant: f64,
}

impl ProgressPlan {
    /// Plan for `count` variants. Non-resizable uploads give the original everything.
    pub fn new(resizable: bool, count: usize) -> Self {
        let original_share = if resizable { 100.0 / 7.0 } else { 100.0 };
        let per_variant = if count > 0 {
            (100.0 - original_share) / count as f64
        } else {
            0.0
        };
        Self {
            original_share,
            per_variant,
        }
    }

    /// Progress after `completed` variants are written.
    pub fn after(&self, completed: usize) -> f64 {
        self.original_share + self.per_variant * completed as f64
    }
}

/// Result of processing one image upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeOutcome {
    /// Original width.
    pub width: u32,
    /// Original height.
    pub height: u32,
    /// Generated variants, narrowest first.
    pub variants: Vec<NewImageVariant>,
}

/// Per-upload image options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    /// Generate resized variants.
    pub resizable: bool,
    /// WebP quality (1-100).
    pub quality: u8,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            resizable: true,
            quality: 80,
        }
    }
}

/// Writes an original image and its resized variants.
#[derive(Debug, Clone, Copy)]
pub struct DerivativePipeline {
    writer: ChunkedWriter,
}

impl DerivativePipeline {
    /// Create a pipeline writing through `writer`.
    pub fn new(writer: ChunkedWriter) -> Self {
        Self { writer }
    }

    /// Write `data` as `dir/name.extension` and, when resizable, one
    /// `<name>-<size>.webp` per breakpoint narrower than the original.
    ///
    /// Any failure aborts the remaining variants. Files written before the
    /// failure are left in place.
    pub async fn process(
        &self,
        dir: &Path,
        name: &str,
        extension: &str,
        data: &[u8],
        options: ImageOptions,
        sink: &dyn ProgressSink,
    ) -> Result<DerivativeOutcome> {
        let owned = data.to_vec();
        let decoded = tokio::task::spawn_blocking(move || decode(&owned))
            .await
            .map_err(|e| VaultError::Decode(e.to_string()))??;

        let sizes = if options.resizable {
            VariantSize::below(decoded.width)
        } else {
            Vec::new()
        };
        let plan = ProgressPlan::new(options.resizable, sizes.len());

        let filename = format!("{name}.{extension}");
        self.writer
            .write(dir, &filename, data, &Scaled::new(sink, plan.original_share))
            .await?;

        let quality = options.quality.clamp(1, 100);
        let mut variants = Vec::with_capacity(sizes.len());
        for (index, size) in sizes.into_iter().enumerate() {
            let variant = self
                .generate(dir, name, &decoded, size, quality)
                .await
                .map_err(|e| VaultError::Derivative {
                    size: size.to_string(),
                    source: Box::new(e),
                })?;
            variants.push(variant);
            sink.report(plan.after(index + 1));
        }

        info!(
            file = %filename,
            width = decoded.width,
            height = decoded.height,
            variants = variants.len(),
            "Image processed"
        );

        Ok(DerivativeOutcome {
            width: decoded.width,
            height: decoded.height,
            variants,
        })
    }

    async fn generate(
        &self,
        dir: &Path,
        name: &str,
        decoded: &DecodedImage,
        size: VariantSize,
        quality: u8,
    ) -> Result<NewImageVariant> {
        let image = Arc::clone(&decoded.image);
        let target = size.width();
        let (bytes, width, height) =
            tokio::task::spawn_blocking(move || render_variant(&image, target, quality))
                .await
                .map_err(|e| VaultError::Encode(e.to_string()))??;

        self.writer
            .write(dir, &variant_filename(name, size), &bytes, &NoProgress)
            .await?;

        debug!(name, %size, width, height, "Variant written");
        Ok(NewImageVariant {
            size,
            width,
            height,
        })
    }
}
