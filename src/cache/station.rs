//! Station cache: `DBStation` entries bucketed by station identity.

use crate::cache::{CacheEntry, ContentAddressedCache};
use crate::station::{DBStation, Station};

impl CacheEntry for DBStation {
    type ContentKey = Station;

    fn id(&self) -> Option<i32> {
        self.id
    }

    fn set_id(&mut self, id: i32) {
        self.id = Some(id);
    }

    fn content_key(&self) -> Station {
        self.station()
    }

    fn same_content(&self, other: &Self) -> bool {
        self.report == other.report && self.coords == other.coords && self.ident == other.ident
    }
}

pub type StationCache = ContentAddressedCache<DBStation>;
