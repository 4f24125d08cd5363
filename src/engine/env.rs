use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Result;
use crate::Error;

/// Region metadata file created inside the environment directory.
pub const REGION_FILE: &str = "__region.meta";

const REGION_MAGIC: u32 = 0x52_47_4E; // ASCII "RGN"
const REGION_VERSION: u16 = 1;

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;

/// Environment open flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvFlags {
    /// Create the directory and region file if missing.
    pub create: bool,
    /// Initialize the in-process memory pool.
    pub init_pool: bool,
}

impl EnvFlags {
    /// Enable creating the directory and region file if missing.
    pub fn create(mut self, enabled: bool) -> Self {
        self.create = enabled;
        self
    }

    /// Enable the in-process memory pool.
    pub fn init_pool(mut self, enabled: bool) -> Self {
        self.init_pool = enabled;
        self
    }
}

/// An engine environment rooted at a directory.
///
/// The environment owns the region metadata file and the memory pool
/// configuration shared by database handles bound to it. Databases bound
/// to an environment must be closed before the environment is.
#[derive(Debug)]
pub struct Environment {
    dir: PathBuf,
    pool_capacity: Option<usize>,
}

impl Environment {
    /// Opens the environment rooted at `dir`, creating the directory and
    /// region file when the create flag is set.
    pub fn open(dir: &Path, flags: EnvFlags, pool_capacity: usize) -> Result<Self> {
        if !dir.is_dir() {
            if !flags.create {
                return Err(Error::Io(format!(
                    "environment directory {} does not exist",
                    dir.display()
                )));
            }
            fs::create_dir_all(dir)?;
        }

        let region_path = dir.join(REGION_FILE);
        if region_path.exists() {
            let state = read_region(&region_path)?;
            if state == STATE_OPEN {
                tracing::warn!(dir = %dir.display(), "region file was not cleanly closed");
            }
        } else if !flags.create {
            return Err(Error::Corrupted(format!(
                "missing region file in {}",
                dir.display()
            )));
        }
        write_region(&region_path, STATE_OPEN, pool_capacity as u64)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            pool_capacity: flags.init_pool.then_some(pool_capacity),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Memory pool buffer capacity, if the pool was initialized.
    pub fn pool_capacity(&self) -> Option<usize> {
        self.pool_capacity
    }

    /// Closes the environment, marking the region file cleanly closed.
    pub fn close(self) -> Result<()> {
        let capacity = self.pool_capacity.unwrap_or(0) as u64;
        write_region(&self.dir.join(REGION_FILE), STATE_CLOSED, capacity)
    }
}

fn read_region(path: &Path) -> Result<u8> {
    let mut file = File::open(path)?;

    let magic = file
        .read_u32::<BigEndian>()
        .map_err(|e| Error::Corrupted(format!("region magic: {e}")))?;
    if magic != REGION_MAGIC {
        return Err(Error::Corrupted(format!(
            "bad region magic {magic:#x} in {}",
            path.display()
        )));
    }

    let version = file
        .read_u16::<BigEndian>()
        .map_err(|e| Error::Corrupted(format!("region version: {e}")))?;
    if version != REGION_VERSION {
        return Err(Error::Corrupted(format!(
            "unsupported region version {version}"
        )));
    }

    let state = file
        .read_u8()
        .map_err(|e| Error::Corrupted(format!("region state: {e}")))?;
    let _pool_capacity = file
        .read_u64::<BigEndian>()
        .map_err(|e| Error::Corrupted(format!("region pool capacity: {e}")))?;

    Ok(state)
}

fn write_region(path: &Path, state: u8, pool_capacity: u64) -> Result<()> {
    let mut buf = Vec::with_capacity(4 + 2 + 1 + 8);
    buf.write_u32::<BigEndian>(REGION_MAGIC)?;
    buf.write_u16::<BigEndian>(REGION_VERSION)?;
    buf.write_u8(state)?;
    buf.write_u64::<BigEndian>(pool_capacity)?;

    let mut file = File::options()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    file.write_all(&buf)?;
    file.sync_all()?;
    Ok(())
}
