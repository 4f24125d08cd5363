//! The anti-cache block store.
//!
//! An anti-cache is the inverse of a cache: a secondary, disk-backed
//! store holding cold data evicted from the hot in-memory store. When
//! memory pressure rises, the eviction manager serializes cold tuples
//! into a contiguous block, allocates a fresh 16-bit block id, and writes
//! the block here, leaving a small in-memory tombstone behind. When a
//! query later touches the tombstone, the block is read back, its tuples
//! are re-materialized, and the handle is dropped.
//!
//! # Data Flow
//!
//! ```text
//!  eviction manager (external)
//!        │ serialize cold tuples
//!        ▼
//!  ┌──────────────┐  next_block_id   ┌──────────────────┐
//!  │ AntiCacheStore├────────────────▶│ BlockIdAllocator │
//!  │              │                  └──────────────────┘
//!  │  write_block │
//!  │  read_block  │──────▶ Block (owned, freshly allocated buffer)
//!  └──────┬───────┘
//!         ▼
//!  engine::Environment + engine::HashDb   (store directory on disk)
//! ```
//!
//! # Failure Semantics
//!
//! Open and close failures, and any engine error during a write, are
//! faults: fatal, because a partial anti-cache breaks the eviction
//! invariant. The only recoverable error is [`Error::UnknownBlock`],
//! returned when a read names an id the store has no record of; it
//! carries the requesting table name and flows up to the query layer as
//! data.
//!
//! [`Error::UnknownBlock`]: crate::Error::UnknownBlock

pub mod allocator;
pub mod block;
pub mod store;

pub use allocator::BlockIdAllocator;
pub use block::{Block, BlockId};
pub use store::{AntiCacheStore, SharedStore, DB_FILE};
