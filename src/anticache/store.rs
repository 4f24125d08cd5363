use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::allocator::BlockIdAllocator;
use super::block::{Block, BlockId};
use crate::config::StoreConfig;
use crate::engine::{EnvFlags, Environment, HashDb};
use crate::error::Result;
use crate::fault;
use crate::Error;

/// Name of the database file inside the store directory.
pub const DB_FILE: &str = "anticache.db";

/// The anti-cache block store: a durable, single-writer repository of
/// evicted blocks keyed by 16-bit block ids.
///
/// The store is owned by a single execution context (one partition's
/// executor); use [`SharedStore`] to share it across contexts. There is
/// no delete operation: blocks accumulate for the store's lifetime and a
/// restart clears everything, since the block id allocator is reset at
/// every open and the eviction layer treats restart as a cold cache.
///
/// Keys are written in host byte order, so a store directory is not
/// portable across machines of differing endianness.
#[derive(Debug)]
pub struct AntiCacheStore {
    config: StoreConfig,
    // Both None only after close; drop treats a lingering handle as an
    // implicit close.
    env: Option<Environment>,
    db: Option<HashDb>,
    allocator: BlockIdAllocator,
}

impl AntiCacheStore {
    /// Opens the store rooted at `dir` with default configuration.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_config(StoreConfig::new(dir))
    }

    /// Opens the store: environment first (created if missing, with the
    /// memory pool initialized), then the database file. Any failure is
    /// an init fault carrying the store directory.
    pub fn open_with_config(config: StoreConfig) -> Result<Self> {
        let flags = EnvFlags::default().create(true).init_pool(true);
        let env = Environment::open(&config.dir, flags, config.pool_buffer_size)
            .map_err(|e| init_fault(&config.dir, e))?;
        let db = HashDb::open(&env, DB_FILE, true).map_err(|e| init_fault(&config.dir, e))?;

        tracing::info!(dir = %config.dir.display(), "opened anti-cache store");
        Ok(Self {
            config,
            env: Some(env),
            db: Some(db),
            allocator: BlockIdAllocator::new(),
        })
    }

    /// Hands out the next unused block id.
    pub fn next_block_id(&self) -> Result<BlockId> {
        self.allocator.next()
    }

    /// Persists `data` under `block_id`, overwriting any prior value.
    /// Blocks until the write is accepted by the engine's memory pool;
    /// durability follows on clean close.
    pub fn write_block(&mut self, block_id: BlockId, data: &[u8]) -> Result<()> {
        tracing::info!(
            block_id,
            size = data.len(),
            "writing block to anti-cache database"
        );
        let key = block_id.to_ne_bytes();
        self.db_mut()?.put(&key, data).map_err(into_fault)
    }

    /// Looks up `block_id`, returning a handle owning a fresh copy of the
    /// stored bytes. `table` names the requesting table for diagnostics
    /// only; it is not part of the key.
    pub fn read_block(&mut self, table: &str, block_id: BlockId) -> Result<Block> {
        let key = block_id.to_ne_bytes();
        match self.db_mut()?.get(&key) {
            Ok(data) => Ok(Block::new(block_id, data)),
            Err(Error::UnknownKey) => {
                tracing::error!(block_id, table, "invalid anti-cache block id");
                Err(Error::UnknownBlock {
                    table: table.to_string(),
                    block_id,
                })
            }
            Err(e) => Err(into_fault(e)),
        }
    }

    /// The store directory.
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// Closes the store: database first, environment second.
    pub fn close(mut self) -> Result<()> {
        self.close_inner()
    }

    fn close_inner(&mut self) -> Result<()> {
        // The environment close runs even if the database close fails;
        // only the reporting is merged afterwards.
        let db_result = match self.db.take() {
            Some(db) => db.close().map_err(into_fault),
            None => Ok(()),
        };
        let env_result = match self.env.take() {
            Some(env) => env.close().map_err(into_fault),
            None => Ok(()),
        };
        merge_close_results(db_result, env_result)
    }

    fn db_mut(&mut self) -> Result<&mut HashDb> {
        self.db
            .as_mut()
            .ok_or_else(|| Error::Fault("store is closed".to_string()))
    }
}

impl Drop for AntiCacheStore {
    fn drop(&mut self) {
        if self.db.is_none() && self.env.is_none() {
            return;
        }
        if let Err(e) = self.close_inner() {
            // A close fault is fatal: a partial anti-cache breaks the
            // eviction invariant.
            tracing::error!(
                error = %e,
                dir = %self.config.dir.display(),
                "anti-cache store close failed during drop"
            );
            std::process::abort();
        }
    }
}

/// A store shared across execution contexts, with a single mutex covering
/// both writes and reads. The eviction path is off the hot query path, so
/// finer granularity buys nothing.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<AntiCacheStore>>,
}

impl SharedStore {
    pub fn new(store: AntiCacheStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Opens the store at `dir` and wraps it for sharing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(AntiCacheStore::open(dir)?))
    }

    pub fn next_block_id(&self) -> Result<BlockId> {
        self.inner.lock()?.next_block_id()
    }

    pub fn write_block(&self, block_id: BlockId, data: &[u8]) -> Result<()> {
        self.inner.lock()?.write_block(block_id, data)
    }

    pub fn read_block(&self, table: &str, block_id: BlockId) -> Result<Block> {
        self.inner.lock()?.read_block(table, block_id)
    }

    /// Closes the store. Fails if other handles are still alive.
    pub fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex.into_inner()?.close(),
            Err(_) => fault!("cannot close a store that is still shared"),
        }
    }
}

fn init_fault(dir: &Path, err: Error) -> Error {
    tracing::error!(dir = %dir.display(), error = %err, "anti-cache initialization error");
    Error::InitFault {
        dir: dir.display().to_string(),
        reason: err.to_string(),
    }
}

/// Maps an engine-layer error into the fatal store fault kind. No engine
/// variant escapes the store boundary.
fn into_fault(err: Error) -> Error {
    match err {
        Error::InitFault { .. } | Error::Fault(_) | Error::UnknownBlock { .. } => err,
        other => Error::Fault(other.to_string()),
    }
}

fn merge_close_results(db: Result<()>, env: Result<()>) -> Result<()> {
    match (db, env) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(db_err), Ok(())) => fault!("failed to close anti-cache database: {db_err}"),
        (Ok(()), Err(env_err)) => fault!("failed to close anti-cache environment: {env_err}"),
        (Err(db_err), Err(env_err)) => fault!(
            "failed to close anti-cache database: {db_err}; \
             failed to close anti-cache environment: {env_err}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::tempdir;

    fn open_store(dir: &Path) -> AntiCacheStore {
        AntiCacheStore::open(dir).expect("Failed to open store")
    }

    #[test]
    fn test_write_read_roundtrip() {
        let dir = tempdir().expect("Failed to create temp dir");
        let mut store = open_store(dir.path());

        store
            .write_block(0, &[0xAA, 0xBB, 0xCC])
            .expect("Failed to write block");

        let block = store.read_block("T1", 0).expect("Failed to read block");
        assert_eq!(block.id(), 0);
        assert_eq!(block.data(), &[0xAA, 0xBB, 0xCC]);

        store.close().expect("Failed to close store");
    }

    #[test]
    fn test_overwrite_wins() {
        let dir = tempdir().expect("Failed to create temp dir");
        let mut store = open_store(dir.path());

        store.write_block(9, b"first").expect("Failed to write");
        store.write_block(9, b"second").expect("Failed to write");

        let block = store.read_block("T1", 9).expect("Failed to read block");
        assert_eq!(block.data(), b"second");
    }

    #[test]
    fn test_unknown_block_carries_table_and_id() {
        let dir = tempdir().expect("Failed to create temp dir");
        let mut store = open_store(dir.path());

        let result = store.read_block("Orders", 7);
        assert_eq!(
            result.unwrap_err(),
            Error::UnknownBlock {
                table: "Orders".to_string(),
                block_id: 7
            }
        );
    }

    #[test]
    fn test_sequential_handles_drop_cleanly() {
        let dir = tempdir().expect("Failed to create temp dir");
        let mut store = open_store(dir.path());

        store.write_block(1, b"one").expect("Failed to write");
        store.write_block(2, b"two").expect("Failed to write");

        let first = store.read_block("T1", 1).expect("Failed to read block");
        drop(first);
        let second = store.read_block("T1", 2).expect("Failed to read block");
        drop(second);
    }

    #[test]
    fn test_block_ids_are_monotonic() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = open_store(dir.path());

        for expected in 0..10u16 {
            assert_eq!(
                store.next_block_id().expect("Failed to allocate"),
                expected
            );
        }
    }

    #[test]
    fn test_reopen_is_cold_cache_or_original_bytes() {
        let dir = tempdir().expect("Failed to create temp dir");
        let payload = vec![0x5A; 1024 * 1024];

        {
            let mut store = open_store(dir.path());
            store.write_block(42, &payload).expect("Failed to write");
            store.close().expect("Failed to close store");
        }

        // The allocator is not persisted; the store makes no promise that
        // block 42 survives a restart. What it does promise is that a
        // read either returns the original bytes or fails cleanly.
        let mut store = open_store(dir.path());
        match store.read_block("T1", 42) {
            Ok(block) => assert_eq!(block.data(), payload.as_slice()),
            Err(Error::UnknownBlock { table, block_id }) => {
                assert_eq!(table, "T1");
                assert_eq!(block_id, 42);
            }
            Err(e) => panic!("Unexpected error on reopen read: {e}"),
        }
    }

    #[test]
    fn test_open_fails_under_unusable_parent() {
        let dir = tempdir().expect("Failed to create temp dir");
        let blocking_file = dir.path().join("not_a_directory");
        std::fs::write(&blocking_file, b"occupied").expect("Failed to write file");

        let store_dir = blocking_file.join("store");
        let result = AntiCacheStore::open(&store_dir);

        match result {
            Err(Error::InitFault { dir, .. }) => {
                assert!(dir.contains("not_a_directory"));
            }
            other => panic!("Expected InitFault, got: {other:?}"),
        }
    }

    #[test]
    fn test_thousand_blocks_read_in_reverse() {
        let dir = tempdir().expect("Failed to create temp dir");
        let mut store = open_store(dir.path());

        for id in 0..1000u16 {
            let payload = format!("block payload {id}");
            store
                .write_block(id, payload.as_bytes())
                .expect("Failed to write");
        }

        for id in (0..1000u16).rev() {
            let block = store.read_block("T1", id).expect("Failed to read block");
            assert_eq!(block.data(), format!("block payload {id}").as_bytes());
        }
    }

    #[test]
    fn test_shared_store_concurrent_distinct_ids() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = SharedStore::open(dir.path()).expect("Failed to open store");

        let mut handles = Vec::new();
        for thread_id in 0..2u16 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                for i in 0..50u16 {
                    let block_id = thread_id * 1000 + i;
                    let payload = format!("payload {block_id}");
                    store
                        .write_block(block_id, payload.as_bytes())
                        .expect("Failed to write");

                    let block = store
                        .read_block("T1", block_id)
                        .expect("Failed to read block");
                    assert_eq!(block.data(), payload.as_bytes());
                }
            }));
        }
        for handle in handles {
            handle.join().expect("Thread panicked");
        }

        store.close().expect("Failed to close store");
    }

    #[test]
    fn test_shared_store_close_requires_sole_handle() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = SharedStore::open(dir.path()).expect("Failed to open store");
        let second = store.clone();

        let result = store.close();
        assert!(matches!(result, Err(Error::Fault(_))));

        second.close().expect("Failed to close store");
    }

    #[test]
    fn test_merge_close_results() {
        assert_eq!(merge_close_results(Ok(()), Ok(())), Ok(()));

        let db_err: Result<()> = fault!("pool flush failed");
        let merged = merge_close_results(db_err, Ok(())).unwrap_err();
        assert!(merged.to_string().contains("close anti-cache database"));

        let env_err: Result<()> = fault!("region write failed");
        let merged = merge_close_results(Ok(()), env_err).unwrap_err();
        assert!(merged.to_string().contains("close anti-cache environment"));

        let both = merge_close_results(fault!("db down"), fault!("env down")).unwrap_err();
        let message = both.to_string();
        assert!(message.contains("db down"));
        assert!(message.contains("env down"));
    }

    #[test]
    fn test_catalog_supplies_table_names_for_diagnostics() {
        let dir = tempdir().expect("Failed to create temp dir");
        let mut store = open_store(dir.path());

        let mut catalog = crate::catalog::Catalog::new();
        catalog
            .execute("add / clusters cluster\nadd /clusters[cluster] tables Orders")
            .expect("Failed to build catalog");
        let table = catalog
            .item_for_ref("/clusters[cluster]/tables[Orders]")
            .expect("Table not found");

        let result = store.read_block(table.name(), 3);
        assert_eq!(
            result.unwrap_err(),
            Error::UnknownBlock {
                table: "Orders".to_string(),
                block_id: 3
            }
        );
    }

    #[test]
    fn test_same_id_same_bytes_across_tables() {
        let dir = tempdir().expect("Failed to create temp dir");
        let mut store = open_store(dir.path());

        store.write_block(5, b"shared bytes").expect("Failed to write");

        let from_orders = store.read_block("Orders", 5).expect("Failed to read");
        let from_items = store.read_block("Items", 5).expect("Failed to read");
        assert_eq!(from_orders.data(), from_items.data());
    }
}
