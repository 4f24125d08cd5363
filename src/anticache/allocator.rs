use std::sync::atomic::{AtomicU32, Ordering};

use super::block::BlockId;
use crate::error::Result;
use crate::fault;

/// Monotonic allocator handing out the next unused block id.
///
/// The counter starts at 0 at every store open and is not persisted; a
/// restarted process begins again from 0, which is sound because the
/// eviction layer treats restart as a cold cache. The counter never
/// decrements and never skips. Exhausting the 16-bit id space is a fault;
/// callers avoid it by sizing the store or rotating.
#[derive(Debug, Default)]
pub struct BlockIdAllocator {
    // Wider than the id so exhaustion is observable instead of wrapping.
    next: AtomicU32,
}

impl BlockIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current id and post-increments the counter.
    pub fn next(&self) -> Result<BlockId> {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        if id > BlockId::MAX as u32 {
            return fault!("block id space exhausted");
        }
        Ok(id as BlockId)
    }

    /// How many ids have been handed out.
    pub fn allocated(&self) -> u32 {
        self.next.load(Ordering::SeqCst).min(BlockId::MAX as u32 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_ids_are_sequential_from_zero() {
        let allocator = BlockIdAllocator::new();
        for expected in 0..100u16 {
            assert_eq!(allocator.next().expect("Failed to allocate"), expected);
        }
        assert_eq!(allocator.allocated(), 100);
    }

    #[test]
    fn test_id_space_exhaustion() {
        let allocator = BlockIdAllocator::new();
        for _ in 0..=BlockId::MAX as u32 {
            allocator.next().expect("Failed to allocate");
        }

        let result = allocator.next();
        assert!(matches!(result, Err(Error::Fault(_))));
    }

    #[test]
    fn test_concurrent_allocation_is_dense() {
        use std::collections::HashSet;
        use std::sync::Arc;
        use std::thread;

        let allocator = Arc::new(BlockIdAllocator::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let allocator = Arc::clone(&allocator);
            handles.push(thread::spawn(move || {
                (0..250)
                    .map(|_| allocator.next().expect("Failed to allocate"))
                    .collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("Thread panicked") {
                assert!(seen.insert(id), "id {id} handed out twice");
            }
        }
        assert_eq!(seen.len(), 1000);
        assert_eq!(allocator.allocated(), 1000);
    }
}
