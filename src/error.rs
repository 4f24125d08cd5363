use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Icebox errors.
///
/// The store surface exposes exactly three kinds: `InitFault` and `Fault`
/// are fatal (a partial anti-cache breaks the eviction invariant), while
/// `UnknownBlock` is the sole recoverable kind and flows upward as data.
/// The remaining variants are engine-, catalog-, and stream-level errors;
/// engine variants never escape the store boundary, where they are mapped
/// into `InitFault` or `Fault`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// Opening the store failed. Carries the store directory and the
    /// engine diagnostic. Always fatal.
    InitFault { dir: String, reason: String },
    /// A write or close failed at the engine layer. Always fatal.
    Fault(String),
    /// A read named a block id the store has no record of. Carries the
    /// requesting table name for diagnostics. Recoverable.
    UnknownBlock { table: String, block_id: u16 },
    /// An IO error.
    Io(String),
    /// On-disk data failed validation: bad magic, unsupported version,
    /// checksum mismatch, or a truncated record.
    Corrupted(String),
    /// A key lookup missed at the engine layer. Mapped to `UnknownBlock`
    /// at the store boundary.
    UnknownKey,
    /// Invalid caller input, typically a malformed catalog statement or a
    /// stream misuse.
    InvalidInput(String),
    /// A catalog command added an entry that already exists.
    DuplicateEntry(String),
    /// A catalog command named a ref that does not resolve.
    UnknownReference(String),
    /// Reference fields left unresolved after a catalog command stream.
    UnresolvedReferences(Vec<String>),
    /// A change payload exceeding the stream block capacity.
    ChangeTooLarge { size: usize, capacity: usize },
    /// A stream rollback that would cross the committed offset.
    RollbackPastCommit { mark: u64, committed: u64 },
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::InitFault { dir, reason } => {
                write!(
                    f,
                    "failed to initialize anti-cache database in directory {dir}: {reason}"
                )
            }
            Error::Fault(msg) => write!(f, "anti-cache store fault: {msg}"),
            Error::UnknownBlock { table, block_id } => {
                write!(f, "unknown anti-cache block {block_id} for table '{table}'")
            }
            Error::Io(msg) => write!(f, "io error: {msg}"),
            Error::Corrupted(msg) => write!(f, "corrupted data: {msg}"),
            Error::UnknownKey => write!(f, "key not found"),
            Error::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Error::DuplicateEntry(msg) => write!(f, "duplicate entry: {msg}"),
            Error::UnknownReference(msg) => write!(f, "unknown reference: {msg}"),
            Error::UnresolvedReferences(paths) => {
                write!(f, "unresolved references: {}", paths.join(", "))
            }
            Error::ChangeTooLarge { size, capacity } => {
                write!(
                    f,
                    "change of {size} bytes exceeds stream block capacity {capacity}"
                )
            }
            Error::RollbackPastCommit { mark, committed } => {
                write!(f, "rollback to {mark} crosses committed offset {committed}")
            }
        }
    }
}

/// Constructs an Error::Fault for the given format string.
#[macro_export]
macro_rules! fault {
    ($($args:tt)*) => { $crate::error::Error::Fault(format!($($args)*)).into() };
}

/// Constructs an Error::InvalidInput for the given format string.
#[macro_export]
macro_rules! errinput {
    ($($args:tt)*) => { $crate::error::Error::InvalidInput(format!($($args)*)).into() };
}

/// An Icebox Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<Error> for Result<T> {
    fn from(error: Error) -> Self {
        Err(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Error::Fault(err.to_string())
    }
}
