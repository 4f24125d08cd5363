//! The change-log stream wrapper.
//!
//! Committed row changes are buffered into fixed-capacity blocks and
//! handed to an external consumer, with rollback-to-mark for aborted
//! transactions and a tick-driven periodic flush. The layout of a change
//! payload is opaque to this layer.

pub mod block;
pub mod stream;

pub use block::StreamBlock;
pub use stream::ChangeStream;
