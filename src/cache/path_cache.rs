//! Cache of resolved asset file paths, used on the read path only.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use super::{document_key, image_key, TtlCache};
use crate::asset::VariantSize;

/// Asset whose file path is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedAsset {
    /// A document.
    Document(i64),
    /// An image original, or one of its variants.
    Image(i64, Option<VariantSize>),
}

impl CachedAsset {
    fn key(self) -> String {
        match self {
            CachedAsset::Document(id) => document_key(id),
            CachedAsset::Image(id, variant) => image_key(id, variant.map(VariantSize::as_str)),
        }
    }
}

/// Maps assets to their last resolved file path.
#[derive(Clone)]
pub struct ResolvedPathCache {
    cache: Arc<dyn TtlCache>,
    ttl: Duration,
}

impl ResolvedPathCache {
    /// Create a path cache on top of a TTL cache.
    pub fn new(cache: Arc<dyn TtlCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Look up a cached path.
    pub fn get(&self, asset: CachedAsset) -> Option<PathBuf> {
        let path = self.cache.get(&asset.key()).map(PathBuf::from);
        trace!(?asset, hit = path.is_some(), "Path cache lookup");
        path
    }

    /// Remember a resolved path.
    pub fn put(&self, asset: CachedAsset, path: &std::path::Path) {
        self.cache
            .set(&asset.key(), path.to_string_lossy().into_owned(), self.ttl);
    }

    /// Forget a cached path.
    pub fn invalidate(&self, asset: CachedAsset) {
        self.cache.delete(&asset.key());
    }

    /// Forget an image original and every variant.
    pub fn invalidate_image(&self, id: i64) {
        self.invalidate(CachedAsset::Image(id, None));
        for size in VariantSize::ALL {
            self.invalidate(CachedAsset::Image(id, Some(size)));
        }
    }
}

impl std::fmt::Debug for ResolvedPathCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedPathCache")
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryTtlCache;

    fn cache() -> ResolvedPathCache {
        ResolvedPathCache::new(Arc::new(MemoryTtlCache::new(100)), Duration::from_secs(60))
    }

    #[test]
    fn test_put_and_get() {
        let cache = cache();
        let asset = CachedAsset::Document(1);
        assert_eq!(cache.get(asset), None);

        cache.put(asset, std::path::Path::new("/srv/a/report.pdf"));
        assert_eq!(cache.get(asset), Some(PathBuf::from("/srv/a/report.pdf")));

        cache.invalidate(asset);
        assert_eq!(cache.get(asset), None);
    }

    #[test]
    fn test_variants_are_separate_entries() {
        let cache = cache();
        cache.put(CachedAsset::Image(1, None), std::path::Path::new("/a/cat.png"));
        cache.put(
            CachedAsset::Image(1, Some(VariantSize::Xs)),
            std::path::Path::new("/a/cat-xs.webp"),
        );

        assert_eq!(
            cache.get(CachedAsset::Image(1, Some(VariantSize::Xs))),
            Some(PathBuf::from("/a/cat-xs.webp"))
        );
        assert_eq!(cache.get(CachedAsset::Image(1, Some(VariantSize::Sm))), None);

        // Same id, different kinds.
        assert_eq!(cache.get(CachedAsset::Document(1)), None);
    }

    #[test]
    fn test_invalidate_image_clears_variants() {
        let cache = cache();
        cache.put(CachedAsset::Image(2, None), std::path::Path::new("/a/dog.png"));
        cache.put(
            CachedAsset::Image(2, Some(VariantSize::Lg)),
            std::path::Path::new("/a/dog-lg.webp"),
        );

        cache.invalidate_image(2);
        assert_eq!(cache.get(CachedAsset::Image(2, None)), None);
        assert_eq!(cache.get(CachedAsset::Image(2, Some(VariantSize::Lg))), None);
    }
}
