//! Content-addressed caches for the database write path.
//!
//! While inserting data, the same station and the same (level, time range)
//! pair come up over and over. These caches remember the surrogate ids the
//! backing store assigned to them, so that each descriptor is resolved
//! against the store at most once per transaction.
//!
//! Two indexes:
//! - forward: id → entry, owning the entry by value
//! - reverse: content key → ids of entries with that key
//!
//! The reverse index stores ids only, so the two maps can be mutated
//! independently. There is no eviction: the cache lives as long as its
//! transaction and is only ever emptied by [`ContentAddressedCache::clear`].

pub mod levtr;
pub mod station;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::error::{Result, SummaryError};

pub use levtr::{LevTrCache, LevTrEntry};
pub use station::StationCache;

/// An entry that can live in a [`ContentAddressedCache`].
pub trait CacheEntry: Clone + fmt::Debug {
    /// Coarse content key used to bucket entries in the reverse index.
    type ContentKey: Hash + Eq;

    fn id(&self) -> Option<i32>;

    fn set_id(&mut self, id: i32);

    fn content_key(&self) -> Self::ContentKey;

    /// Full content comparison, ignoring ids.
    fn same_content(&self, other: &Self) -> bool;
}

/// Forward and reverse lookup of entries that have a surrogate id.
#[derive(Debug)]
pub struct ContentAddressedCache<E: CacheEntry> {
    entries: HashMap<i32, E>,
    by_content: HashMap<E::ContentKey, Vec<i32>>,
}

impl<E: CacheEntry> ContentAddressedCache<E> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            by_content: HashMap::new(),
        }
    }

    /// Look up an entry by id. O(1).
    pub fn find_entry(&self, id: i32) -> Option<&E> {
        self.entries.get(&id)
    }

    /// Find the id of an entry.
    ///
    /// If the entry already carries an id it is returned as is; otherwise
    /// the reverse index bucket for its content key is scanned.
    pub fn find_id(&self, entry: &E) -> Option<i32> {
        if let Some(id) = entry.id() {
            return Some(id);
        }
        self.by_content
            .get(&entry.content_key())?
            .iter()
            .copied()
            .find(|id| {
                self.entries
                    .get(id)
                    .map_or(false, |cached| cached.same_content(entry))
            })
    }

    /// Cache an entry that has an id.
    ///
    /// Inserting an id that is already cached is idempotent if the content
    /// matches, and an error if it does not: cached entries never change.
    pub fn insert(&mut self, entry: E) -> Result<&E> {
        let id = entry.id().ok_or_else(|| {
            SummaryError::MissingId(format!("cannot cache {:?} before its id is known", entry))
        })?;

        match self.entries.entry(id) {
            Entry::Occupied(existing) => {
                if !existing.get().same_content(&entry) {
                    tracing::error!(
                        id,
                        cached = ?existing.get(),
                        new = ?entry,
                        "Cache content mismatch for id"
                    );
                    return Err(SummaryError::Consistency(format!(
                        "id {} is cached as {:?}, refusing to replace it with {:?}",
                        id,
                        existing.get(),
                        entry
                    )));
                }
                Ok(&*existing.into_mut())
            }
            Entry::Vacant(slot) => {
                tracing::trace!(id, entry = ?entry, "Caching entry");
                self.by_content
                    .entry(entry.content_key())
                    .or_default()
                    .push(id);
                Ok(&*slot.insert(entry))
            }
        }
    }

    /// Assign `id` to the entry, then cache it.
    pub fn insert_with_id(&mut self, mut entry: E, id: i32) -> Result<&E> {
        entry.set_id(id);
        self.insert(entry)
    }

    /// Return the id for the entry's content, asking `resolver` (usually a
    /// lookup or insert in the backing store) only on a cache miss.
    pub fn resolve_id<F>(&mut self, entry: &E, resolver: F) -> Result<i32>
    where
        F: FnOnce(&E) -> Result<i32>,
    {
        if entry.id().is_none() {
            if let Some(id) = self.find_id(entry) {
                return Ok(id);
            }
        }
        let id = match entry.id() {
            Some(id) => id,
            None => resolver(entry)?,
        };
        self.insert_with_id(entry.clone(), id)?;
        Ok(id)
    }

    /// Drop every cached entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_content.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E: CacheEntry> Default for ContentAddressedCache<E> {
    fn default() -> Self {
        Self::new()
    }
}
