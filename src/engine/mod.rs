//! The storage engine underneath the anti-cache store.
//!
//! The engine has two layers, opened in order and closed in reverse:
//!
//! - An [`Environment`] rooted at a directory. It owns the region
//!   metadata file and the in-process memory pool configuration.
//! - A [`HashDb`] bound to that environment: a hash-organized database
//!   file serving point lookups over opaque byte keys and values.
//!
//! # File Layout
//!
//! ```text
//! <dir>/
//! ├── __region.meta      environment region file
//! └── <name>.db          hash-organized database file
//!
//! database file:
//! +----------------------------------------------+
//! | Header (magic, version, count, checksum)     |
//! +----------------------------------------------+
//! | Record: key_len | value_len | crc | key | value
//! +----------------------------------------------+
//! | Record ...                                   |
//! +----------------------------------------------+
//! ```
//!
//! The record region is append-organized and the newest record for a key
//! wins; the in-memory hash index is rebuilt by a validating scan at open.
//! Writes are accepted by the memory pool and are durable on sync or
//! clean close.

pub mod db;
pub mod env;
pub mod pool;
pub mod record;

pub use db::HashDb;
pub use env::{EnvFlags, Environment};
pub use pool::MemoryPool;
