//! Chunked, progress-reporting file writes.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, trace};

use crate::progress::ProgressSink;
use crate::Result;

/// Default write increment in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Writes byte payloads to disk in fixed-size increments.
///
/// After each increment the sink receives `index * 100 / chunks`, and a final
/// `100` once the file is flushed. On an I/O error the bytes already written
/// stay on disk.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedWriter {
    chunk_size: usize,
}

impl Default for ChunkedWriter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ChunkedWriter {
    /// Create a writer with the given increment. Zero falls back to the default.
    pub fn new(chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self { chunk_size }
    }

    /// Get the write increment.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Write `data` to `dir/filename`, creating `dir` as needed.
    pub async fn write(
        &self,
        dir: &Path,
        filename: &str,
        data: &[u8],
        sink: &dyn ProgressSink,
    ) -> Result<PathBuf> {
        fs::create_dir_all(dir).await?;

        let path = dir.join(filename);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await?;

        let total = data.len().div_ceil(self.chunk_size);
        for (index, chunk) in data.chunks(self.chunk_size).enumerate() {
            let offset = (index * self.chunk_size) as u64;
            file.seek(SeekFrom::Start(offset)).await?;
            file.write_all(chunk).await?;

            let progress = index as f64 * 100.0 / total as f64;
            trace!(path = %path.display(), index, total, "Chunk written");
            sink.report(progress);
        }

        file.flush().await?;
        sink.report(100.0);

        debug!(path = %path.display(), bytes = data.len(), "File written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::tests::RecordingSink;
    use tempfile::TempDir;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_round_trip_any_chunk_size() {
        let temp_dir = TempDir::new().unwrap();
        let data = payload(10_000);

        for chunk_size in [1, 4096, data.len() + 1] {
            let writer = ChunkedWriter::new(chunk_size);
            let sink = RecordingSink::default();
            let filename = format!("out-{chunk_size}.bin");

            let path = writer
                .write(temp_dir.path(), &filename, &data, &sink)
                .await
                .unwrap();

            assert_eq!(std::fs::read(&path).unwrap(), data);
        }
    }

    #[tokio::test]
    async fn test_progress_monotonic_and_ends_at_100() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ChunkedWriter::new(4096);
        let sink = RecordingSink::default();

        writer
            .write(temp_dir.path(), "a.bin", &payload(4096 * 4), &sink)
            .await
            .unwrap();

        let values = sink.values();
        assert_eq!(values, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_creates_missing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("a").join("b").join("c");
        let sink = RecordingSink::default();

        let path = ChunkedWriter::default()
            .write(&dir, "x.txt", b"hello", &sink)
            .await
            .unwrap();

        assert_eq!(path, dir.join("x.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_empty_payload() {
        let temp_dir = TempDir::new().unwrap();
        let sink = RecordingSink::default();

        let path = ChunkedWriter::default()
            .write(temp_dir.path(), "empty", &[], &sink)
            .await
            .unwrap();

        assert!(std::fs::read(path).unwrap().is_empty());
        assert_eq!(sink.values(), vec![100.0]);
    }

    #[tokio::test]
    async fn test_overwrite_truncates() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ChunkedWriter::new(2);
        let sink = RecordingSink::default();

        writer
            .write(temp_dir.path(), "f", b"long contents", &sink)
            .await
            .unwrap();
        let path = writer.write(temp_dir.path(), "f", b"short", &sink).await.unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"short");
    }

    #[test]
    fn test_zero_chunk_size_uses_default() {
        assert_eq!(ChunkedWriter::new(0).chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[tokio::test]
    async fn test_io_error_surfaces() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let sink = RecordingSink::default();

        // A regular file where a directory is expected.
        let result = ChunkedWriter::default()
            .write(&blocker.join("sub"), "y", b"data", &sink)
            .await;
        assert!(matches!(result, Err(crate::VaultError::Io(_))));
        assert!(sink.values().is_empty());
    }
}
