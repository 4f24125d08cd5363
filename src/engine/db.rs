use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::env::Environment;
use super::pool::MemoryPool;
use super::record::{RecordHeader, RECORD_HEADER_SIZE};
use crate::error::Result;
use crate::hasher::{checksum_pair, Hasher};
use crate::Error;

pub const DB_HEADER_SIZE: usize = 4 + 2 + 8 + 8;

const DB_MAGIC: u32 = 0x48_44_42; // ASCII "HDB"
const DB_VERSION: u16 = 1;

/// Database file header. The record count and rolling checksum are only
/// rewritten on sync and close, so after an unclean shutdown they lag the
/// record region; the open-time scan validates records individually.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DbHeader {
    magic: u32,
    version: u16,
    record_count: u64,
    checksum: u64,
}

impl DbHeader {
    fn new() -> Self {
        Self {
            magic: DB_MAGIC,
            version: DB_VERSION,
            record_count: 0,
            checksum: 0,
        }
    }
}

impl TryInto<Vec<u8>> for DbHeader {
    type Error = Error;

    fn try_into(self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(DB_HEADER_SIZE);
        buf.write_u32::<BigEndian>(self.magic)?;
        buf.write_u16::<BigEndian>(self.version)?;
        buf.write_u64::<BigEndian>(self.record_count)?;
        buf.write_u64::<BigEndian>(self.checksum)?;
        Ok(buf)
    }
}

impl TryFrom<&[u8]> for DbHeader {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < DB_HEADER_SIZE {
            return Err(Error::Corrupted(format!(
                "database header of {} bytes, expected {DB_HEADER_SIZE}",
                bytes.len()
            )));
        }
        let mut reader = bytes;

        let magic = reader
            .read_u32::<BigEndian>()
            .map_err(|e| Error::Corrupted(format!("database magic: {e}")))?;
        if magic != DB_MAGIC {
            return Err(Error::Corrupted(format!("bad database magic {magic:#x}")));
        }
        let version = reader
            .read_u16::<BigEndian>()
            .map_err(|e| Error::Corrupted(format!("database version: {e}")))?;
        if version != DB_VERSION {
            return Err(Error::Corrupted(format!(
                "unsupported database version {version}"
            )));
        }
        let record_count = reader
            .read_u64::<BigEndian>()
            .map_err(|e| Error::Corrupted(format!("database record count: {e}")))?;
        let checksum = reader
            .read_u64::<BigEndian>()
            .map_err(|e| Error::Corrupted(format!("database checksum: {e}")))?;

        Ok(Self {
            magic,
            version,
            record_count,
            checksum,
        })
    }
}

/// Location of a record's value bytes inside the database file.
#[derive(Debug, Clone, Copy)]
struct Slot {
    value_offset: u64,
    value_len: u32,
    checksum: u64,
}

/// A hash-organized database file.
///
/// Point lookups are served by an in-memory hash index over an
/// append-organized record region; the newest record for a key wins.
/// Writes go through the environment's memory pool and are durable on
/// sync or clean close. Every read returns a fresh allocation, never a
/// view into a pool buffer.
#[derive(Debug)]
pub struct HashDb {
    path: PathBuf,
    /// Handle for header rewrites and positioned value reads. Distinct
    /// from the pool's handle so their file cursors stay independent.
    file: File,
    pool: MemoryPool,
    index: HashMap<Vec<u8>, Slot>,
    header: DbHeader,
    hasher: Hasher,
}

impl HashDb {
    /// Opens (or creates) the database file `name` inside the
    /// environment's directory. The environment must carry a memory pool.
    pub fn open(env: &Environment, name: &str, create: bool) -> Result<Self> {
        let pool_capacity = env.pool_capacity().ok_or_else(|| {
            Error::InvalidInput("environment opened without a memory pool".to_string())
        })?;
        let path = env.dir().join(name);

        let mut pool_file = File::options()
            .create(create)
            .read(true)
            .write(true)
            .open(&path)?;

        let mut file = File::options().read(true).write(true).open(&path)?;

        // Read the header, or write a fresh one into an empty file.
        let mut header_buf = vec![0u8; DB_HEADER_SIZE];
        let header = match file.read_exact(&mut header_buf) {
            Ok(()) => DbHeader::try_from(header_buf.as_slice())?,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                let header = DbHeader::new();
                let bytes: Vec<u8> = header.try_into()?;
                file.seek(SeekFrom::Start(0))?;
                file.write_all(&bytes)?;
                header
            }
            Err(e) => return Err(Error::Io(e.to_string())),
        };

        let (index, hasher, record_count, valid_end) = Self::scan(&path)?;

        if record_count != header.record_count || hasher.value() != header.checksum {
            tracing::warn!(
                path = %path.display(),
                scanned = record_count,
                recorded = header.record_count,
                "database file was not cleanly closed"
            );
        }

        // Drop any tail the scan could not validate.
        let file_len = file.metadata()?.len().max(DB_HEADER_SIZE as u64);
        if file_len > valid_end {
            tracing::warn!(
                path = %path.display(),
                valid_end,
                file_len,
                "truncating unreadable record tail"
            );
            pool_file.set_len(valid_end)?;
        }
        pool_file.seek(SeekFrom::Start(valid_end))?;

        Ok(Self {
            path,
            file,
            pool: MemoryPool::new(pool_file, valid_end, pool_capacity),
            index,
            header: DbHeader {
                record_count,
                checksum: hasher.value(),
                ..header
            },
            hasher,
        })
    }

    /// Scans the record region, returning the index, rolling checksum,
    /// record count, and the end offset of the last valid record.
    fn scan(path: &Path) -> Result<(HashMap<Vec<u8>, Slot>, Hasher, u64, u64)> {
        let mut reader = BufReader::new(File::open(path)?);
        reader.seek(SeekFrom::Start(DB_HEADER_SIZE as u64))?;

        let mut index = HashMap::new();
        let mut hasher = Hasher::new();
        let mut record_count = 0u64;
        let mut offset = DB_HEADER_SIZE as u64;

        loop {
            let header = match RecordHeader::decode(&mut reader) {
                Ok(Some(header)) => header,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(offset, error = %e, "stopping scan at unreadable record");
                    break;
                }
            };

            let mut key = vec![0u8; header.key_len as usize];
            let mut value = vec![0u8; header.value_len as usize];
            if reader.read_exact(&mut key).is_err() || reader.read_exact(&mut value).is_err() {
                tracing::warn!(offset, "stopping scan at truncated record");
                break;
            }
            if checksum_pair(&key, &value) != header.checksum {
                tracing::warn!(offset, "stopping scan at checksum mismatch");
                break;
            }

            hasher.update(&key, &value);
            index.insert(
                key,
                Slot {
                    value_offset: offset + RECORD_HEADER_SIZE as u64 + header.key_len as u64,
                    value_len: header.value_len,
                    checksum: header.checksum,
                },
            );
            record_count += 1;
            offset += header.encoded_len();
        }

        Ok((index, hasher, record_count, offset))
    }

    /// Inserts or overwrites the value stored under `key`.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let header = RecordHeader::for_pair(key, value)?;

        let mut record: Vec<u8> = header.try_into()?;
        record.reserve(key.len() + value.len());
        record.extend_from_slice(key);
        record.extend_from_slice(value);

        let offset = self.pool.append(&record)?;
        self.index.insert(
            key.to_vec(),
            Slot {
                value_offset: offset + RECORD_HEADER_SIZE as u64 + key.len() as u64,
                value_len: header.value_len,
                checksum: header.checksum,
            },
        );
        self.hasher.update(key, value);
        self.header.record_count += 1;
        Ok(())
    }

    /// Looks up `key`, returning a freshly allocated copy of its value.
    pub fn get(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        let slot = *self.index.get(key).ok_or(Error::UnknownKey)?;

        self.pool
            .ensure_visible(slot.value_offset + slot.value_len as u64)?;
        self.file.seek(SeekFrom::Start(slot.value_offset))?;
        let mut value = vec![0u8; slot.value_len as usize];
        self.file.read_exact(&mut value)?;

        if checksum_pair(key, &value) != slot.checksum {
            return Err(Error::Corrupted(format!(
                "checksum mismatch for record at offset {} in {}",
                slot.value_offset,
                self.path.display()
            )));
        }
        Ok(value)
    }

    /// Whether `key` has a record.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    /// Total records in the file, superseded ones included.
    pub fn record_count(&self) -> u64 {
        self.header.record_count
    }

    /// Flushes the pool and persists the header.
    pub fn sync(&mut self) -> Result<()> {
        self.pool.sync()?;

        self.header.checksum = self.hasher.value();
        let bytes: Vec<u8> = self.header.try_into()?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&bytes)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Closes the database, making every accepted write durable.
    pub fn close(mut self) -> Result<()> {
        self.sync()
    }
}
