//! In-memory summary aggregation: per-station variable entries and the
//! filters applied to them.
//!
//! `StationEntries<S>` is the whole summary content: one `StationEntry`
//! per station, each holding one `VarEntry` per (level, trange, varcode).
//! Both levels are `SmallSet`s, so inserting is an append and lookups sort
//! lazily.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::query::Query;
use crate::smallset::{KeyOf, SmallSet};
use crate::station::{convert_station, StationLike};
use crate::types::{DatetimeRange, Level, Trange, Varcode};

// ── VarDesc / VarEntry ─────────────────────────────────────────────

/// What a variable is, independently of the station it was measured at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarDesc {
    pub level: Level,
    pub trange: Trange,
    pub varcode: Varcode,
}

impl VarDesc {
    pub fn new(level: Level, trange: Trange, varcode: Varcode) -> Self {
        Self {
            level,
            trange,
            varcode,
        }
    }
}

/// Aggregate for one variable at one station: time span and value count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarEntry {
    pub var: VarDesc,
    pub dtrange: DatetimeRange,
    pub count: u64,
}

impl VarEntry {
    pub fn new(var: VarDesc, dtrange: DatetimeRange, count: u64) -> Self {
        Self {
            var,
            dtrange,
            count,
        }
    }

    /// Fold another observation span into this entry.
    ///
    /// The time span becomes the union (open bounds win) and counts add up.
    pub fn merge(&mut self, dtrange: &DatetimeRange, count: u64) {
        self.dtrange.merge(dtrange);
        self.count = self.count.saturating_add(count);
    }
}

/// Key extractor ordering variable entries by their descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByVarDesc;

impl KeyOf<VarEntry> for ByVarDesc {
    type Key = VarDesc;

    fn key(item: &VarEntry) -> &VarDesc {
        &item.var
    }
}

// ── Filters ────────────────────────────────────────────────────────

/// Station part of a [`Query`].
///
/// `ana_id` is only checked when `S` carries ids.
pub struct StationFilter<'q, S> {
    query: &'q Query,
    active: bool,
    _station: PhantomData<fn(&S)>,
}

impl<'q, S: StationLike> StationFilter<'q, S> {
    pub fn new(query: &'q Query) -> Self {
        Self {
            query,
            active: query.has_station_filter(S::HAS_ID),
            _station: PhantomData,
        }
    }

    /// False if the query has no station criteria and every station passes.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn matches(&self, station: &S) -> bool {
        let q = self.query;
        if let Some(report) = &q.report {
            if station.report() != report {
                return false;
            }
        }
        if let Some(ident) = &q.ident {
            if station.ident() != Some(ident.as_str()) {
                return false;
            }
        }
        let coords = station.coords();
        if let Some(latrange) = &q.latrange {
            if !latrange.contains(coords.lat) {
                return false;
            }
        }
        if let Some(lonrange) = &q.lonrange {
            if !lonrange.contains(coords.lon) {
                return false;
            }
        }
        if S::HAS_ID {
            if let Some(id) = q.ana_id {
                if station.id() != Some(id) {
                    return false;
                }
            }
        }
        true
    }
}

/// Variable part of a [`Query`].
pub struct VarFilter<'q> {
    query: &'q Query,
}

impl<'q> VarFilter<'q> {
    pub fn new(query: &'q Query) -> Self {
        Self { query }
    }

    pub fn matches(&self, entry: &VarEntry) -> bool {
        let q = self.query;
        if let Some(level) = &q.level {
            if entry.var.level != *level {
                return false;
            }
        }
        if let Some(trange) = &q.trange {
            if entry.var.trange != *trange {
                return false;
            }
        }
        if !q.varcodes.is_empty() && !q.varcodes.contains(&entry.var.varcode) {
            return false;
        }
        q.datetime.intersects(&entry.dtrange)
    }
}

// ── StationEntry ───────────────────────────────────────────────────

/// All variables recorded for one station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationEntry<S> {
    pub station: S,
    pub vars: SmallSet<VarEntry, ByVarDesc>,
}

impl<S: StationLike> StationEntry<S> {
    pub fn new(station: S) -> Self {
        Self {
            station,
            vars: SmallSet::new(),
        }
    }

    /// Merge an observation span for `var`, creating the entry if needed.
    pub fn add(&mut self, var: &VarDesc, dtrange: &DatetimeRange, count: u64) {
        match self.vars.find(var) {
            Some(idx) => {
                if let Some(entry) = self.vars.get_mut(idx) {
                    entry.merge(dtrange, count);
                }
            }
            None => {
                self.vars.add(VarEntry::new(*var, *dtrange, count));
            }
        }
    }

    pub fn add_var(&mut self, entry: &VarEntry) {
        self.add(&entry.var, &entry.dtrange, entry.count);
    }

    /// Merge every variable of another entry, whatever its station type.
    pub fn add_entry<T: StationLike>(&mut self, other: &StationEntry<T>) {
        for entry in other.vars.iter() {
            self.add_var(entry);
        }
    }

    /// Merge the variables of `other` that pass `filter`.
    pub fn add_filtered(&mut self, other: &StationEntry<S>, filter: &VarFilter<'_>) {
        for entry in other.vars.iter().filter(|e| filter.matches(e)) {
            self.add_var(entry);
        }
    }

    /// Visit the variables passing `filter`; returns false if `dest` stopped early.
    pub fn iter_filtered<F>(&self, filter: &VarFilter<'_>, mut dest: F) -> bool
    where
        F: FnMut(&VarEntry) -> bool,
    {
        for entry in self.vars.iter() {
            if filter.matches(entry) && !dest(entry) {
                return false;
            }
        }
        true
    }

    pub fn rearrange(&mut self) {
        self.vars.rearrange();
    }
}

/// Key extractor ordering station entries by station.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByStation;

impl<S: StationLike> KeyOf<StationEntry<S>> for ByStation {
    type Key = S;

    fn key(item: &StationEntry<S>) -> &S {
        &item.station
    }
}

// ── StationEntries ─────────────────────────────────────────────────

/// The full content of a summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationEntries<S: StationLike> {
    stations: SmallSet<StationEntry<S>, ByStation>,
}

impl<S: StationLike> StationEntries<S> {
    pub fn new() -> Self {
        Self {
            stations: SmallSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn clear(&mut self) {
        self.stations.clear();
    }

    /// Station entries in storage order.
    pub fn iter(&self) -> std::slice::Iter<'_, StationEntry<S>> {
        self.stations.iter()
    }

    pub fn get(&self, idx: usize) -> Option<&StationEntry<S>> {
        self.stations.get(idx)
    }

    pub fn station(&self, station: &S) -> Option<&StationEntry<S>> {
        self.stations
            .position(station)
            .and_then(|idx| self.stations.get(idx))
    }

    /// Total number of variable entries across all stations.
    pub fn var_count(&self) -> usize {
        self.stations.iter().map(|e| e.vars.len()).sum()
    }

    fn obtain(&mut self, station: &S) -> &mut StationEntry<S> {
        self.stations
            .find_or_add(station, || StationEntry::new(station.clone()))
    }

    pub fn add(&mut self, station: &S, var: &VarDesc, dtrange: &DatetimeRange, count: u64) {
        self.obtain(station).add(var, dtrange, count);
    }

    /// Make sure `station` has an entry, even one without variables.
    pub fn add_station(&mut self, station: &S) {
        self.obtain(station);
    }

    /// Merge one loaded item; `None` only records the station.
    pub fn add_loaded(&mut self, station: &S, var: Option<VarEntry>) {
        match var {
            Some(var) => self.add(station, &var.var, &var.dtrange, var.count),
            None => self.add_station(station),
        }
    }

    /// Merge another summary's content, converting its stations to `S`.
    pub fn add_entries<T: StationLike>(&mut self, other: &StationEntries<T>) {
        for entry in other.iter() {
            let station: S = convert_station(&entry.station);
            self.obtain(&station).add_entry(entry);
        }
    }

    /// Merge the parts of `other` that match `query`.
    ///
    /// A station that passes the station filter gets an entry here even if
    /// none of its variables pass the variable filter.
    pub fn add_filtered(&mut self, other: &StationEntries<S>, query: &Query) {
        let station_filter = StationFilter::<S>::new(query);
        let var_filter = VarFilter::new(query);
        for entry in other.iter() {
            if station_filter.is_active() && !station_filter.matches(&entry.station) {
                continue;
            }
            self.obtain(&entry.station)
                .add_filtered(entry, &var_filter);
        }
    }

    /// Visit (station, variable) pairs matching `query`; returns false if
    /// `dest` stopped early.
    pub fn iter_filtered<F>(&self, query: &Query, mut dest: F) -> bool
    where
        F: FnMut(&S, &VarEntry) -> bool,
    {
        let station_filter = StationFilter::<S>::new(query);
        let var_filter = VarFilter::new(query);
        for entry in self.stations.iter() {
            if station_filter.is_active() && !station_filter.matches(&entry.station) {
                continue;
            }
            if !entry.iter_filtered(&var_filter, |var| dest(&entry.station, var)) {
                return false;
            }
        }
        true
    }

    /// Sort stations and the variables of every station.
    pub fn rearrange(&mut self) {
        self.stations.rearrange();
        for entry in self.stations.iter_mut() {
            entry.rearrange();
        }
    }

    /// Station entries in station order, without rearranging storage.
    pub fn sorted_refs(&self) -> Vec<&StationEntry<S>> {
        self.stations.sorted_refs()
    }

    /// Sorted view of the content.
    pub fn sorted(&mut self) -> &[StationEntry<S>] {
        self.rearrange();
        self.stations.sorted()
    }
}

impl<S: StationLike> Default for StationEntries<S> {
    fn default() -> Self {
        Self::new()
    }
}
