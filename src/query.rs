//! Query filter surface consumed by the summary backends.

use std::collections::BTreeSet;

use crate::types::{Datetime, DatetimeRange, LatRange, Level, LonRange, Trange, Varcode};

/// Filter for summary lookups.
///
/// Every field is optional; an empty query matches everything. The
/// datetime range is the one derived by the query layer from its finer
/// grained year/month/day/... bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub report: Option<String>,
    pub ident: Option<String>,
    pub latrange: Option<LatRange>,
    pub lonrange: Option<LonRange>,
    /// Only honored by summaries keyed by `DBStation`.
    pub ana_id: Option<i32>,
    pub level: Option<Level>,
    pub trange: Option<Trange>,
    /// Empty set means any varcode.
    pub varcodes: BTreeSet<Varcode>,
    pub datetime: DatetimeRange,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(mut self, report: impl Into<String>) -> Self {
        self.report = Some(report.into());
        self
    }

    pub fn ident(mut self, ident: impl Into<String>) -> Self {
        self.ident = Some(ident.into());
        self
    }

    pub fn latrange(mut self, range: LatRange) -> Self {
        self.latrange = Some(range);
        self
    }

    pub fn lonrange(mut self, range: LonRange) -> Self {
        self.lonrange = Some(range);
        self
    }

    pub fn ana_id(mut self, id: i32) -> Self {
        self.ana_id = Some(id);
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn trange(mut self, trange: Trange) -> Self {
        self.trange = Some(trange);
        self
    }

    pub fn varcode(mut self, code: Varcode) -> Self {
        self.varcodes.insert(code);
        self
    }

    pub fn varcodes(mut self, codes: impl IntoIterator<Item = Varcode>) -> Self {
        self.varcodes.extend(codes);
        self
    }

    pub fn datetime_min(mut self, dt: Datetime) -> Self {
        self.datetime.min = Some(dt);
        self
    }

    pub fn datetime_max(mut self, dt: Datetime) -> Self {
        self.datetime.max = Some(dt);
        self
    }

    pub fn datetime(mut self, range: DatetimeRange) -> Self {
        self.datetime = range;
        self
    }

    /// True if any station-level criterion is set.
    ///
    /// `ana_id` only counts when the caller's station type can carry an id.
    pub fn has_station_filter(&self, with_id: bool) -> bool {
        self.report.is_some()
            || self.ident.is_some()
            || self.latrange.is_some()
            || self.lonrange.is_some()
            || (with_id && self.ana_id.is_some())
    }

    /// True if nothing restricts the result.
    pub fn is_empty(&self) -> bool {
        !self.has_station_filter(true)
            && self.level.is_none()
            && self.trange.is_none()
            && self.varcodes.is_empty()
            && self.datetime.is_open()
    }
}
