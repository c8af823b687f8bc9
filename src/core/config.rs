use std::path::PathBuf;
use crate::storage::segment::CompressionType;

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_path: PathBuf,

    pub write_batch_size: usize,    // Entries applied per ingestion batch
    pub flush_threshold: usize,     // Inserted entries before the write buffer is retired

    pub compression: CompressionType,
    pub flush_on_close: bool,
    pub sync_segments: bool,        // fsync segment files before rename
}

impl Config {
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Config {
            storage_path: storage_path.into(),
            ..Config::default()
        }
    }

    pub fn with_write_batch_size(mut self, size: usize) -> Self {
        self.write_batch_size = size.max(1);
        self
    }

    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold.max(1);
        self
    }

    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_flush_on_close(mut self, flush_on_close: bool) -> Self {
        self.flush_on_close = flush_on_close;
        self
    }

    pub fn with_sync_segments(mut self, sync: bool) -> Self {
        self.sync_segments = sync;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: PathBuf::from("./data"),
            write_batch_size: 4096,
            flush_threshold: 1 << 20,                  // ~1M cells per generation
            compression: CompressionType::Lz4,
            flush_on_close: true,
            sync_segments: true,
        }
    }
}
