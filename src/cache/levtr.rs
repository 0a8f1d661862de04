//! (level, time range) cache entries.

use crate::cache::{CacheEntry, ContentAddressedCache};
use crate::types::{Level, Trange};

/// A level/time-range pair, with the id the backing store gave it.
#[derive(Debug, Clone, Copy)]
pub struct LevTrEntry {
    pub id: Option<i32>,
    pub level: Level,
    pub trange: Trange,
}

impl LevTrEntry {
    pub fn new(level: Level, trange: Trange) -> Self {
        Self {
            id: None,
            level,
            trange,
        }
    }

    pub fn with_id(id: i32, level: Level, trange: Trange) -> Self {
        Self {
            id: Some(id),
            level,
            trange,
        }
    }
}

/// If both sides have an id, only the ids are compared; otherwise the
/// level and time range are.
///
/// This is not transitive, so `LevTrEntry` is not `Eq`.
impl PartialEq for LevTrEntry {
    fn eq(&self, other: &Self) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            _ => self.level == other.level && self.trange == other.trange,
        }
    }
}

impl CacheEntry for LevTrEntry {
    type ContentKey = Level;

    fn id(&self) -> Option<i32> {
        self.id
    }

    fn set_id(&mut self, id: i32) {
        self.id = Some(id);
    }

    fn content_key(&self) -> Level {
        self.level
    }

    fn same_content(&self, other: &Self) -> bool {
        self.level == other.level && self.trange == other.trange
    }
}

pub type LevTrCache = ContentAddressedCache<LevTrEntry>;
