//! Term index storage: purely in memory, or snapshotted to a directory.
//!
//! A disk index has separate read and write sides. The writer is loaded
//! from the last snapshot on first write; the reader on first read.
//! Writes become visible to the reader only through [`DiskIndex::commit`],
//! which replaces the snapshot file and refreshes an open reader.

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::termindex::error::IndexResult;
use crate::termindex::format::{read_snapshot, write_snapshot};
use crate::termindex::memory::MemoryIndex;

/// Snapshot file name inside an index directory.
pub const SNAPSHOT_FILE: &str = "terms.six";

// ── DiskIndex ──────────────────────────────────────────────────────

pub struct DiskIndex {
    dir: PathBuf,
    reader: RefCell<Option<MemoryIndex>>,
    writer: Option<MemoryIndex>,
}

impl DiskIndex {
    /// Open an index directory, creating it if needed. No file is read yet.
    pub fn open(dir: impl AsRef<Path>) -> IndexResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            reader: RefCell::new(None),
            writer: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    fn load(&self) -> IndexResult<MemoryIndex> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(MemoryIndex::new());
        }
        let file = File::open(&path)?;
        if file.metadata()?.len() == 0 {
            return read_snapshot(&[]);
        }
        // SAFETY: snapshots are only ever replaced by rename, never
        // modified in place, so the mapping stays valid while we read it.
        let mmap = unsafe { Mmap::map(&file)? };
        let index = read_snapshot(&mmap)?;
        tracing::debug!(
            path = %path.display(),
            docs = index.doc_count(),
            "Loaded term index snapshot"
        );
        Ok(index)
    }

    /// Run `f` on the committed state, opening the reader if needed.
    pub fn with_reader<R>(&self, f: impl FnOnce(&MemoryIndex) -> R) -> IndexResult<R> {
        let guard = self.reader.borrow();
        if let Some(index) = guard.as_ref() {
            return Ok(f(index));
        }
        drop(guard);

        let index = self.load()?;
        let result = f(&index);
        *self.reader.borrow_mut() = Some(index);
        Ok(result)
    }

    /// The pending write state, loaded from the last snapshot on first use.
    pub fn writer(&mut self) -> IndexResult<&mut MemoryIndex> {
        let index = match self.writer.take() {
            Some(index) => index,
            None => self.load()?,
        };
        Ok(self.writer.insert(index))
    }

    /// Make pending writes durable and visible to readers.
    ///
    /// Without a writer there is nothing to commit.
    pub fn commit(&mut self) -> IndexResult<()> {
        let Some(writer) = self.writer.as_ref() else {
            return Ok(());
        };

        let path = self.snapshot_path();
        let tmp_path = self.dir.join(format!("{}.tmp", SNAPSHOT_FILE));
        {
            let file = File::create(&tmp_path)?;
            let mut out = BufWriter::new(file);
            write_snapshot(writer, &mut out)?;
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;
        tracing::debug!(
            path = %path.display(),
            docs = writer.doc_count(),
            "Committed term index snapshot"
        );

        if self.reader.borrow().is_some() {
            let fresh = self.load()?;
            *self.reader.borrow_mut() = Some(fresh);
        }
        Ok(())
    }

    /// Empty the pending state. Readers keep seeing the old content until commit.
    pub fn clear(&mut self) {
        self.writer = Some(MemoryIndex::new());
    }

    /// Drop the reader so the next read reloads from disk.
    pub fn refresh_reader(&self) {
        if !self.snapshot_path().exists() {
            tracing::warn!(
                path = %self.snapshot_path().display(),
                "No term index snapshot on disk, reader will see an empty index"
            );
        }
        *self.reader.borrow_mut() = None;
    }
}

// ── TermIndex ──────────────────────────────────────────────────────

/// A term index in either storage mode.
pub enum TermIndex {
    /// Reads see writes immediately; nothing is persisted.
    Memory(MemoryIndex),
    Disk(DiskIndex),
}

impl TermIndex {
    pub fn in_memory() -> Self {
        TermIndex::Memory(MemoryIndex::new())
    }

    pub fn open(dir: impl AsRef<Path>) -> IndexResult<Self> {
        Ok(TermIndex::Disk(DiskIndex::open(dir)?))
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, TermIndex::Disk(_))
    }

    pub fn with_reader<R>(&self, f: impl FnOnce(&MemoryIndex) -> R) -> IndexResult<R> {
        match self {
            TermIndex::Memory(index) => Ok(f(index)),
            TermIndex::Disk(disk) => disk.with_reader(f),
        }
    }

    pub fn writer(&mut self) -> IndexResult<&mut MemoryIndex> {
        match self {
            TermIndex::Memory(index) => Ok(index),
            TermIndex::Disk(disk) => disk.writer(),
        }
    }

    pub fn commit(&mut self) -> IndexResult<()> {
        match self {
            TermIndex::Memory(_) => Ok(()),
            TermIndex::Disk(disk) => disk.commit(),
        }
    }

    pub fn clear(&mut self) {
        match self {
            TermIndex::Memory(index) => index.clear(),
            TermIndex::Disk(disk) => disk.clear(),
        }
    }

    /// Make the next read reload the committed state.
    pub fn refresh_reader(&self) {
        if let TermIndex::Disk(disk) = self {
            disk.refresh_reader();
        }
    }
}
