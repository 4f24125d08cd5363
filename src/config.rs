use std::path::PathBuf;

/// Configuration for the anti-cache store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory path for the store
    pub dir: PathBuf,

    /// Memory pool write buffer capacity (default: 1MB)
    pub pool_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./icebox"),
            pool_buffer_size: 1024 * 1024, // 1MB
        }
    }
}

impl StoreConfig {
    /// Create a new config with the given store directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Set the memory pool write buffer capacity
    pub fn pool_buffer_size(mut self, size: usize) -> Self {
        self.pool_buffer_size = size;
        self
    }
}

/// Configuration for a change-log stream
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Block buffer capacity in bytes (default: 2MB)
    pub block_capacity: usize,

    /// Minimum milliseconds between periodic flushes (default: 1000ms)
    pub flush_interval_ms: i64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            block_capacity: 2 * 1024 * 1024, // 2MB
            flush_interval_ms: 1000,
        }
    }
}

impl StreamConfig {
    /// Set the block buffer capacity
    pub fn block_capacity(mut self, capacity: usize) -> Self {
        self.block_capacity = capacity;
        self
    }

    /// Set the minimum interval between periodic flushes
    pub fn flush_interval_ms(mut self, interval: i64) -> Self {
        self.flush_interval_ms = interval;
        self
    }
}
