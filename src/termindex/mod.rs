//! Embedded term index.
//!
//! Documents are bags of string terms with a few numeric value slots.
//! The index answers boolean term queries (AND of ORs), enumerates terms
//! by prefix, finds a document by its exact term set, and keeps lower
//! bound, upper bound and sum per value slot.
//!
//! ```text
//! TermIndex ── Memory(MemoryIndex)
//!           └─ Disk(DiskIndex) ── reader: MemoryIndex (last commit, mmap-loaded)
//!                              └─ writer: MemoryIndex (pending)
//! ```

pub mod document;
pub mod error;
pub mod format;
pub mod memory;
pub mod query;
pub mod store;

pub use document::{DocId, Document, ValueSlot};
pub use error::{IndexError, IndexResult};
pub use memory::{MemoryIndex, ValueStats};
pub use query::IndexQuery;
pub use store::{DiskIndex, TermIndex, SNAPSHOT_FILE};
