use std::fmt;

use crc::{Algorithm, Crc};

pub const CRC_64_ECMA: Algorithm<u64> = crc::CRC_64_ECMA_182;

/// Checksum of a single key/value pair, as stored in record headers.
pub fn checksum_pair(key: &[u8], value: &[u8]) -> u64 {
    let crc64 = Crc::<u64>::new(&CRC_64_ECMA);
    let mut digest = crc64.digest();
    digest.update(key);
    digest.update(value);
    digest.finalize()
}

/// Rolling checksum over a stream of key/value records.
///
/// Per-record checksums are XOR-combined, so the rolling value is
/// independent of the order records are visited in. The database file
/// header stores this value and it is recomputed by the open-time scan.
pub struct Hasher {
    rolling_checksum: u64,
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hasher")
            .field("rolling_checksum", &self.rolling_checksum)
            .finish()
    }
}

impl Hasher {
    pub fn new() -> Self {
        Self {
            rolling_checksum: 0,
        }
    }

    /// Folds a key/value record into the rolling checksum.
    pub fn update(&mut self, key: &[u8], value: &[u8]) {
        self.rolling_checksum ^= checksum_pair(key, value);
    }

    /// Returns the current rolling checksum.
    pub fn value(&self) -> u64 {
        self.rolling_checksum
    }

    /// Resets the rolling checksum to its initial state.
    pub fn reset(&mut self) {
        self.rolling_checksum = 0;
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}
