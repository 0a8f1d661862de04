//! On-disk snapshot format of a term index.
//!
//! # File Layout
//!
//! ```text
//! [SnapshotHeader]   32 bytes
//! [body]             body_len bytes, bincode Vec<(DocId, Document)>
//! ```
//!
//! Postings and value statistics are not stored; they are rebuilt from
//! the documents on load.

use std::io::Write;

use crate::termindex::document::{DocId, Document};
use crate::termindex::error::{IndexError, IndexResult};
use crate::termindex::memory::MemoryIndex;

/// Magic bytes for snapshot files.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"SIX1";

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

pub const SNAPSHOT_HEADER_SIZE: usize = 32;

/// Snapshot header -- exactly 32 bytes.
///
/// ```text
/// Offset  Size  Field
/// 0       4     magic: b"SIX1"
/// 4       4     version: u32 = 1
/// 8       8     doc_count: u64
/// 16      8     next_doc_id: u64
/// 24      8     body_len: u64
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub doc_count: u64,
    pub next_doc_id: u64,
    pub body_len: u64,
}

impl SnapshotHeader {
    pub fn new(doc_count: u64, next_doc_id: u64, body_len: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: SNAPSHOT_VERSION,
            doc_count,
            next_doc_id,
            body_len,
        }
    }

    /// Write header (32 bytes, little-endian).
    pub fn write_to<W: Write>(&self, w: &mut W) -> IndexResult<()> {
        w.write_all(&self.magic)?;
        w.write_all(&self.version.to_le_bytes())?;
        w.write_all(&self.doc_count.to_le_bytes())?;
        w.write_all(&self.next_doc_id.to_le_bytes())?;
        w.write_all(&self.body_len.to_le_bytes())?;
        Ok(())
    }

    /// Parse and validate a header from the start of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> IndexResult<Self> {
        if bytes.len() < SNAPSHOT_HEADER_SIZE {
            return Err(IndexError::InvalidFormat(format!(
                "Snapshot too short for header: {} bytes",
                bytes.len()
            )));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != SNAPSHOT_MAGIC {
            return Err(IndexError::InvalidFormat(format!(
                "Not a term index snapshot: expected SIX1, got {:?}",
                magic
            )));
        }
        let version = read_u32(bytes, 4);
        if version != SNAPSHOT_VERSION {
            return Err(IndexError::InvalidFormat(format!(
                "Unsupported snapshot version: {}",
                version
            )));
        }
        Ok(Self {
            magic,
            version,
            doc_count: read_u64(bytes, 8),
            next_doc_id: read_u64(bytes, 16),
            body_len: read_u64(bytes, 24),
        })
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

/// Serialize the documents of `index` as a snapshot.
pub fn write_snapshot<W: Write>(index: &MemoryIndex, w: &mut W) -> IndexResult<()> {
    let docs: Vec<(DocId, &Document)> = index.documents().collect();
    let body = bincode::serialize(&docs)?;
    SnapshotHeader::new(docs.len() as u64, index.next_doc_id(), body.len() as u64).write_to(w)?;
    w.write_all(&body)?;
    Ok(())
}

/// Rebuild an index from snapshot bytes.
pub fn read_snapshot(bytes: &[u8]) -> IndexResult<MemoryIndex> {
    let header = SnapshotHeader::from_bytes(bytes)?;
    let end = (SNAPSHOT_HEADER_SIZE as u64)
        .checked_add(header.body_len)
        .filter(|&end| end <= bytes.len() as u64)
        .ok_or_else(|| {
            IndexError::InvalidFormat(format!(
                "Snapshot truncated: header announces {} body bytes, {} available",
                header.body_len,
                bytes.len() - SNAPSHOT_HEADER_SIZE
            ))
        })?;
    let body = &bytes[SNAPSHOT_HEADER_SIZE..end as usize];
    let docs: Vec<(DocId, Document)> = bincode::deserialize(body)?;
    if docs.len() as u64 != header.doc_count {
        return Err(IndexError::InvalidFormat(format!(
            "Snapshot holds {} documents, header says {}",
            docs.len(),
            header.doc_count
        )));
    }
    MemoryIndex::from_documents(header.next_doc_id, docs)
}
