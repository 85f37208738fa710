//! Test helpers for integration tests.
//!
//! Provides a fully wired `TestVault` on an in-memory database and a
//! subscriber that captures progress frames.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{DynamicImage, ImageFormat, RgbImage};
use tempfile::TempDir;

use filevault::asset::{NewFolder, NewStoragePath};
use filevault::progress::{Subscriber, SubscriberClosed};
use filevault::web::AppState;
use filevault::{
    AssetService, ChunkedWriter, Database, Folder, HandshakeBroker, MemoryTtlCache,
    ProgressBus, ProgressEvent, ResolvedPathCache, StoragePath, Upload,
};

/// A wired asset service writing into a temporary directory.
pub struct TestVault {
    pub service: AssetService,
    pub broker: HandshakeBroker,
    pub bus: Arc<ProgressBus>,
    pub temp_dir: TempDir,
}

impl TestVault {
    /// Create a vault with the given chunk size.
    pub async fn new(chunk_size: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = Database::open_in_memory()
            .await
            .expect("Failed to create test database");
        let paths = Arc::new(MemoryTtlCache::new(1_000));
        let handshakes = Arc::new(MemoryTtlCache::new(1_000));
        let bus = Arc::new(ProgressBus::new());

        let service = AssetService::new(
            db,
            temp_dir.path(),
            ChunkedWriter::new(chunk_size),
            80,
            Arc::clone(&bus),
            ResolvedPathCache::new(paths, Duration::from_secs(60)),
        );
        let broker = HandshakeBroker::new(handshakes, Duration::from_secs(60));

        Self {
            service,
            broker,
            bus,
            temp_dir,
        }
    }

    /// Create a storage path with one root folder.
    pub async fn storage_with_folder(
        &self,
        app: &str,
        limit: Option<i64>,
    ) -> (StoragePath, Folder) {
        let mut new = NewStoragePath::new(app, format!("{app}-assets"));
        new.limit = limit;
        let storage_path = self.service.create_storage_path(&new).await.unwrap();
        let folder = self
            .service
            .create_folder(&NewFolder::new(storage_path.id, "uploads"))
            .await
            .unwrap();
        (storage_path, folder)
    }

    /// App state for building a router.
    pub fn app_state(&self) -> AppState {
        AppState::new(self.service.clone(), self.broker.clone())
    }

    /// Register a capturing subscriber on the bus.
    pub fn capture(&self) -> CapturingSubscriber {
        let subscriber = CapturingSubscriber::default();
        self.bus.subscribe(Box::new(subscriber.clone()));
        subscriber
    }
}

/// Subscriber that keeps every frame it receives.
#[derive(Clone, Default)]
pub struct CapturingSubscriber {
    frames: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl CapturingSubscriber {
    /// Decoded progress events received so far.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|f| serde_json::from_str(f).expect("frame is a progress event"))
            .collect()
    }
}

impl Subscriber for CapturingSubscriber {
    fn send_text(&self, text: &str) -> Result<(), SubscriberClosed> {
        if self.is_closed() {
            return Err(SubscriberClosed);
        }
        self.frames.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A plain text upload.
pub fn text_upload(folder_id: i64, filename: &str, data: &[u8]) -> Upload {
    Upload {
        folder_id,
        filename: filename.to_string(),
        mime_type: "text/plain".to_string(),
        data: data.to_vec(),
    }
}

/// Encode a generated RGB image as PNG.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 64])
    }));
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("Failed to encode PNG");
    buf
}
