//! Integration test: station and level/time-range dedup caches.
//!
//! Simulates an import loop resolving descriptors against a backing
//! store, and checks the caches keep their contract: ids are stable,
//! cached content never changes, lookups by content find the right id.

use std::cell::Cell;

use obsarchive::cache::{LevTrCache, LevTrEntry, StationCache};
use obsarchive::{Coords, DBStation, Level, Station, SummaryError, Trange};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn station(report: &str, lat: f64, lon: f64) -> Station {
    Station::fixed(report, Coords::from_degrees(lat, lon))
}

/// Stand-in for the store's id sequence; counts how often it is asked.
struct FakeStore {
    next: Cell<i32>,
    calls: Cell<usize>,
}

impl FakeStore {
    fn new() -> Self {
        Self { next: Cell::new(100), calls: Cell::new(0) }
    }

    fn assign(&self) -> obsarchive::Result<i32> {
        self.calls.set(self.calls.get() + 1);
        let id = self.next.get();
        self.next.set(id + 1);
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// Tests: LevTrCache
// ---------------------------------------------------------------------------

#[test]
fn levtr_same_id_different_level_fails() {
    let mut cache = LevTrCache::new();
    cache
        .insert(LevTrEntry::with_id(1, Level::of_type(1), Trange::instant()))
        .unwrap();

    let err = cache
        .insert(LevTrEntry::with_id(1, Level::of_type(2), Trange::instant()))
        .unwrap_err();
    assert!(matches!(err, SummaryError::Consistency(_)), "{:?}", err);

    // The first entry is untouched.
    let cached = cache.find_entry(1).unwrap();
    assert_eq!(cached.level, Level::of_type(1));
    assert_eq!(cache.len(), 1);
}

#[test]
fn levtr_reinsert_is_idempotent() {
    let mut cache = LevTrCache::new();
    let entry = LevTrEntry::with_id(3, Level::single(103, 2000), Trange::of(254, 0, 0));
    cache.insert(entry).unwrap();
    cache.insert(entry).unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.find_id(&LevTrEntry::new(entry.level, entry.trange)), Some(3));
}

#[test]
fn levtr_same_level_different_trange_gets_distinct_ids() {
    let mut cache = LevTrCache::new();
    let level = Level::single(103, 2000);
    cache.insert(LevTrEntry::with_id(1, level, Trange::of(254, 0, 0))).unwrap();
    cache.insert(LevTrEntry::with_id(2, level, Trange::of(0, 0, 3600))).unwrap();

    assert_eq!(cache.find_id(&LevTrEntry::new(level, Trange::of(254, 0, 0))), Some(1));
    assert_eq!(cache.find_id(&LevTrEntry::new(level, Trange::of(0, 0, 3600))), Some(2));
    assert_eq!(cache.find_id(&LevTrEntry::new(level, Trange::of(1, 0, 3600))), None);
}

#[test]
fn levtr_resolve_id_in_import_loop() {
    let store = FakeStore::new();
    let mut cache = LevTrCache::new();
    let descriptors = [
        (Level::of_type(1), Trange::instant()),
        (Level::single(103, 2000), Trange::of(254, 0, 0)),
        (Level::of_type(1), Trange::instant()),
        (Level::single(103, 2000), Trange::of(254, 0, 0)),
        (Level::of_type(1), Trange::instant()),
    ];

    let ids: Vec<i32> = descriptors
        .iter()
        .map(|(l, t)| cache.resolve_id(&LevTrEntry::new(*l, *t), |_| store.assign()).unwrap())
        .collect();

    assert_eq!(ids, vec![100, 101, 100, 101, 100]);
    assert_eq!(store.calls.get(), 2);
    assert_eq!(cache.len(), 2);
}

// ---------------------------------------------------------------------------
// Tests: StationCache
// ---------------------------------------------------------------------------

#[test]
fn station_resolve_id_in_import_loop() {
    let store = FakeStore::new();
    let mut cache = StationCache::new();
    let stations = [
        station("synop", 44.5, 11.3),
        station("synop", 45.0, 7.6),
        station("temp", 44.5, 11.3),
        station("synop", 44.5, 11.3),
        station("temp", 44.5, 11.3),
    ];

    let ids: Vec<i32> = stations
        .iter()
        .map(|s| {
            let entry = DBStation::new(None, s.report.clone(), s.coords, s.ident.clone());
            cache.resolve_id(&entry, |_| store.assign()).unwrap()
        })
        .collect();

    assert_eq!(ids, vec![100, 101, 102, 100, 102]);
    assert_eq!(store.calls.get(), 3);
    assert_eq!(cache.find_entry(101).unwrap().station(), stations[1]);
}

#[test]
fn station_known_id_skips_resolver() {
    let store = FakeStore::new();
    let mut cache = StationCache::new();
    let entry = DBStation::with_id(42, station("synop", 44.5, 11.3));
    let id = cache.resolve_id(&entry, |_| store.assign()).unwrap();
    assert_eq!(id, 42);
    assert_eq!(store.calls.get(), 0);
    assert!(cache.find_entry(42).is_some());
}

#[test]
fn station_mobile_ident_is_part_of_content() {
    let mut cache = StationCache::new();
    let coords = Coords::from_degrees(40.0, -20.0);
    cache
        .insert(DBStation::with_id(1, Station::mobile("ship", coords, "AAA")))
        .unwrap();
    cache
        .insert(DBStation::with_id(2, Station::mobile("ship", coords, "BBB")))
        .unwrap();

    let lookup = DBStation::new(None, "ship", coords, Some("BBB".to_string()));
    assert_eq!(cache.find_id(&lookup), Some(2));

    let err = cache
        .insert(DBStation::with_id(1, Station::mobile("ship", coords, "CCC")))
        .unwrap_err();
    assert_eq!(err.code(), "CONSISTENCY");
}

#[test]
fn clear_forgets_everything() {
    let mut stations = StationCache::new();
    let mut levtrs = LevTrCache::new();
    stations
        .insert(DBStation::with_id(1, station("synop", 44.5, 11.3)))
        .unwrap();
    levtrs
        .insert(LevTrEntry::with_id(1, Level::of_type(1), Trange::instant()))
        .unwrap();

    stations.clear();
    levtrs.clear();

    assert!(stations.is_empty());
    assert!(levtrs.is_empty());
    let lookup = DBStation::new(None, "synop", Coords::from_degrees(44.5, 11.3), None);
    assert_eq!(stations.find_id(&lookup), None);
    assert_eq!(levtrs.find_id(&LevTrEntry::new(Level::of_type(1), Trange::instant())), None);

    // Ids can be reused for other content after a clear.
    stations
        .insert(DBStation::with_id(1, station("temp", 0.0, 0.0)))
        .unwrap();
}

#[test]
fn missing_id_is_rejected() {
    let mut cache = StationCache::new();
    let err = cache
        .insert(DBStation::new(None, "synop", Coords::new(0, 0), None))
        .unwrap_err();
    assert!(matches!(err, SummaryError::MissingId(_)));
    assert!(cache.is_empty());
}
