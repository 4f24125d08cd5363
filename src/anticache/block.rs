/// Identifier of an anti-cache block. The id space is per store instance.
pub type BlockId = u16;

/// An evicted block fetched back from the store.
///
/// The block exclusively owns a freshly allocated copy of the stored
/// bytes, distinct from any engine-internal buffer. It is movable but not
/// clonable; the buffer is released when the block is dropped, on every
/// exit path.
#[derive(Debug)]
pub struct Block {
    block_id: BlockId,
    data: Vec<u8>,
}

impl Block {
    pub(crate) fn new(block_id: BlockId, data: Vec<u8>) -> Self {
        Self { block_id, data }
    }

    /// The id this block was read under.
    pub fn id(&self) -> BlockId {
        self.block_id
    }

    /// The block payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consumes the block, handing the buffer to the caller.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
