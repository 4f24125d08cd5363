use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Result;
use crate::errinput;
use crate::hasher::checksum_pair;
use crate::Error;

/// Fixed-width prefix of every record: key length, value length, checksum.
pub const RECORD_HEADER_SIZE: usize = 2 + 4 + 8;

pub const MAX_KEY_LEN: usize = u16::MAX as usize;
pub const MAX_VALUE_LEN: usize = u32::MAX as usize;

/// Header of a single key/value record in the database file.
///
/// The checksum covers the key bytes followed by the value bytes and is
/// verified both by the open-time scan and on every read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordHeader {
    pub key_len: u16,
    pub value_len: u32,
    pub checksum: u64,
}

impl RecordHeader {
    /// Builds the header for a key/value pair, computing its checksum.
    pub fn for_pair(key: &[u8], value: &[u8]) -> Result<Self> {
        if key.len() > MAX_KEY_LEN {
            return errinput!("key of {} bytes exceeds maximum {}", key.len(), MAX_KEY_LEN);
        }
        if value.len() > MAX_VALUE_LEN {
            return errinput!(
                "value of {} bytes exceeds maximum {}",
                value.len(),
                MAX_VALUE_LEN
            );
        }
        Ok(Self {
            key_len: key.len() as u16,
            value_len: value.len() as u32,
            checksum: checksum_pair(key, value),
        })
    }

    /// Total encoded length of the record this header describes.
    pub fn encoded_len(&self) -> u64 {
        RECORD_HEADER_SIZE as u64 + self.key_len as u64 + self.value_len as u64
    }

    /// Decodes the next record header from a record-region stream.
    /// Returns `None` on a clean end of the region; EOF inside the
    /// header is a corruption.
    pub fn decode<R: Read>(reader: &mut R) -> Result<Option<Self>> {
        let key_len = match reader.read_u16::<BigEndian>() {
            Ok(len) => len,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(Error::Io(e.to_string())),
        };
        let value_len = reader
            .read_u32::<BigEndian>()
            .map_err(|e| Error::Corrupted(format!("record value length: {e}")))?;
        let checksum = reader
            .read_u64::<BigEndian>()
            .map_err(|e| Error::Corrupted(format!("record checksum: {e}")))?;

        Ok(Some(Self {
            key_len,
            value_len,
            checksum,
        }))
    }
}

impl TryInto<Vec<u8>> for RecordHeader {
    type Error = Error;

    fn try_into(self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE);
        buf.write_u16::<BigEndian>(self.key_len)?;
        buf.write_u32::<BigEndian>(self.value_len)?;
        buf.write_u64::<BigEndian>(self.checksum)?;
        Ok(buf)
    }
}

impl TryFrom<&[u8]> for RecordHeader {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RECORD_HEADER_SIZE {
            return Err(Error::Corrupted(format!(
                "record header of {} bytes, expected {RECORD_HEADER_SIZE}",
                bytes.len()
            )));
        }
        match Self::decode(&mut &*bytes)? {
            Some(header) => Ok(header),
            None => Err(Error::Corrupted("empty record header".to_string())),
        }
    }
}
