use std::fs::File;
use std::io::{BufWriter, Write};

use crate::error::Result;

/// In-process memory pool fronting a database file's write path.
///
/// Appends are accepted into the pool buffer; a write is "accepted" once
/// the pool holds it, and becomes durable when the pool is synced. Reads
/// of a region newer than the last flush force one first, so a caller
/// never observes a torn view of its own writes.
#[derive(Debug)]
pub struct MemoryPool {
    writer: BufWriter<File>,
    /// Logical end of the file, including bytes still in the pool buffer.
    logical_len: u64,
    /// Bytes known to have reached the backing file.
    flushed_len: u64,
}

impl MemoryPool {
    /// Wraps `file`, which must be positioned at `len`, the current end of
    /// the valid region.
    pub fn new(file: File, len: u64, capacity: usize) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, file),
            logical_len: len,
            flushed_len: len,
        }
    }

    /// Appends bytes at the logical end of the file, returning the offset
    /// of the first byte written.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.logical_len;
        self.writer.write_all(bytes)?;
        self.logical_len += bytes.len() as u64;
        Ok(offset)
    }

    /// Makes every byte below `end` visible to readers of the backing file.
    pub fn ensure_visible(&mut self, end: u64) -> Result<()> {
        if end > self.flushed_len {
            self.flush()?;
        }
        Ok(())
    }

    /// Drains the pool buffer into the backing file.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.flushed_len = self.logical_len;
        Ok(())
    }

    /// Flushes the pool and syncs the backing file to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    pub fn logical_len(&self) -> u64 {
        self.logical_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    fn pool_with_file() -> (tempfile::TempDir, std::path::PathBuf, MemoryPool) {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("pool.db");
        let file = File::options()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .expect("Failed to open file");
        let pool = MemoryPool::new(file, 0, 16);
        (dir, path, pool)
    }

    #[test]
    fn test_append_returns_offsets() {
        let (_dir, _path, mut pool) = pool_with_file();

        assert_eq!(pool.append(b"abc").expect("Failed to append"), 0);
        assert_eq!(pool.append(b"defg").expect("Failed to append"), 3);
        assert_eq!(pool.logical_len(), 7);
    }

    #[test]
    fn test_ensure_visible_flushes_buffered_bytes() {
        let (_dir, path, mut pool) = pool_with_file();

        pool.append(b"abc").expect("Failed to append");
        pool.ensure_visible(3).expect("Failed to make visible");

        let mut contents = Vec::new();
        File::open(&path)
            .expect("Failed to reopen file")
            .read_to_end(&mut contents)
            .expect("Failed to read file");
        assert_eq!(contents, b"abc");
    }

    #[test]
    fn test_ensure_visible_noop_below_flushed() {
        let (_dir, _path, mut pool) = pool_with_file();

        pool.append(b"abc").expect("Failed to append");
        pool.flush().expect("Failed to flush");

        // Already flushed; must not error even with more buffered data.
        pool.append(b"d").expect("Failed to append");
        pool.ensure_visible(3).expect("Failed to make visible");
    }
}
