//! The catalog: clusters, tables and columns as a typed tree of named
//! nodes, mutated by a line-oriented command stream and queried by path.
//!
//! The catalog is a name resolver. The anti-cache layer uses it as the
//! identifier source for the table names it attaches to block-read
//! diagnostics; it holds no storage state of its own.

pub mod catalog;
pub mod node;

pub use catalog::Catalog;
pub use node::{CatalogNode, FieldValue, NodeKind};
