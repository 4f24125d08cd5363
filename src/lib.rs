//! Icebox: the anti-cache storage subsystem of an in-memory OLTP engine.
//!
//! Hot data stays resident in memory; under pressure, cold blocks of
//! table rows are evicted into the disk-backed [`AntiCacheStore`] and
//! fetched back on access. The [`catalog`] resolves cluster, table and
//! column identifiers, and the [`stream`] module buffers committed row
//! changes for an external consumer.

pub mod anticache;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod stream;

pub use anticache::{AntiCacheStore, Block, BlockId, SharedStore};
pub use catalog::Catalog;
pub use config::{StoreConfig, StreamConfig};
pub use error::{Error, Result};
pub use hasher::Hasher;
pub use stream::ChangeStream;
