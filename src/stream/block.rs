/// A fixed-capacity buffer of change bytes, positioned in the stream by
/// the universal stream offset (uso) of its first byte.
#[derive(Debug)]
pub struct StreamBlock {
    buffer: Vec<u8>,
    capacity: usize,
    start_uso: u64,
}

impl StreamBlock {
    pub(crate) fn new(capacity: usize, start_uso: u64) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            start_uso,
        }
    }

    /// Stream offset of the first byte in this block.
    pub fn start_uso(&self) -> u64 {
        self.start_uso
    }

    /// Stream offset one past the last byte in this block.
    pub fn end_uso(&self) -> u64 {
        self.start_uso + self.buffer.len() as u64
    }

    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn remaining(&self) -> usize {
        self.capacity - self.buffer.len()
    }

    pub(crate) fn append(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() <= self.remaining());
        self.buffer.extend_from_slice(bytes);
    }

    /// Drops every byte at or past `uso`.
    pub(crate) fn truncate_to_uso(&mut self, uso: u64) {
        debug_assert!(uso >= self.start_uso);
        self.buffer.truncate((uso - self.start_uso) as usize);
    }

    /// Clears the block for reuse at a new stream position.
    pub(crate) fn recycle(&mut self, start_uso: u64) {
        self.buffer.clear();
        self.start_uso = start_uso;
    }
}
