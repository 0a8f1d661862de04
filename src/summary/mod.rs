//! Summary of the archive content.
//!
//! A summary records, for every station and every (level, trange,
//! varcode) observed there, the time span covered and how many values
//! exist. Query planners use it to answer "what is in here" without
//! touching the data.
//!
//! Two backends implement [`Summary`]:
//! - [`MemorySummary`]: nested small sets, optionally saved as JSON
//! - [`IndexSummary`]: one term index document per station/variable pair
//!
//! Both are generic over the station representation, so the same code
//! serves summaries keyed by [`Station`] and by [`DBStation`].

pub mod cursor;
pub mod entry;
pub mod indexed;
pub mod json;
pub mod memory;

use std::io::{Read, Write};

use crate::error::{Result, SummaryError};
use crate::query::Query;
use crate::station::{convert_station, DBStation, Station, StationLike};
use crate::types::{Datetime, DatetimeRange, Level, Trange, Varcode};

pub use cursor::{EnqValue, SummaryCursor};
pub use entry::{StationEntries, StationEntry, StationFilter, VarDesc, VarEntry, VarFilter};
pub use indexed::IndexSummary;
pub use memory::MemorySummary;

/// Receives (station, variable, time span, count); returning false stops
/// the iteration.
pub type EntryVisitor<'a, S> = dyn FnMut(&S, &VarDesc, &DatetimeRange, u64) -> bool + 'a;

/// Common interface of the summary backends.
///
/// Enumeration methods take a visitor that can stop early, and return
/// `Ok(false)` when it did.
pub trait Summary<S: StationLike> {
    /// Every station, each once.
    fn stations(&self, dest: &mut dyn FnMut(&S) -> bool) -> Result<bool>;

    /// Every distinct report name.
    fn reports(&self, dest: &mut dyn FnMut(&str) -> bool) -> Result<bool>;

    fn levels(&self, dest: &mut dyn FnMut(&Level) -> bool) -> Result<bool>;

    fn tranges(&self, dest: &mut dyn FnMut(&Trange) -> bool) -> Result<bool>;

    fn varcodes(&self, dest: &mut dyn FnMut(&Varcode) -> bool) -> Result<bool>;

    /// Earliest datetime, `None` if empty or unbounded below.
    fn datetime_min(&self) -> Result<Option<Datetime>>;

    /// Latest datetime, `None` if empty or unbounded above.
    fn datetime_max(&self) -> Result<Option<Datetime>>;

    /// Total number of values.
    fn data_count(&self) -> Result<u64>;

    /// Cursor over the entries matching `query`.
    fn query_summary(&self, query: &Query) -> Result<SummaryCursor<S>>;

    fn iter(&self, dest: &mut EntryVisitor<'_, S>) -> Result<bool> {
        self.iter_filtered(&Query::new(), dest)
    }

    fn iter_filtered(&self, query: &Query, dest: &mut EntryVisitor<'_, S>) -> Result<bool>;

    fn clear(&mut self) -> Result<()>;

    /// Merge one observation span into the summary.
    fn add(&mut self, station: &S, var: &VarDesc, dtrange: &DatetimeRange, count: u64) -> Result<()>;

    /// Merge a summary keyed by plain stations.
    fn add_summary(&mut self, other: &dyn Summary<Station>) -> Result<()> {
        copy_entries(self, other, &Query::new())
    }

    /// Merge a summary keyed by database stations.
    fn add_db_summary(&mut self, other: &dyn Summary<DBStation>) -> Result<()> {
        copy_entries(self, other, &Query::new())
    }

    /// Merge the parts of `other` matching `query`.
    fn add_filtered(&mut self, other: &dyn Summary<S>, query: &Query) -> Result<()> {
        copy_entries(self, other, query)
    }

    /// Make pending changes durable, where the backend persists anything.
    fn commit(&mut self) -> Result<()>;

    fn to_json(&self, out: &mut dyn Write) -> Result<()> {
        let mut entries = StationEntries::new();
        self.iter(&mut |station, var, dtrange, count| {
            entries.add(station, var, dtrange, count);
            true
        })?;
        entries.rearrange();
        json::write_entries(out, &entries)
    }

    /// Merge summary JSON into the current content.
    ///
    /// Stations listed without variables are skipped unless the backend
    /// keeps empty station entries.
    fn load_json(&mut self, input: &mut dyn Read) -> Result<()> {
        json::load_entries(input, &mut |station: S, var| match var {
            Some(var) => self.add(&station, &var.var, &var.dtrange, var.count),
            None => Ok(()),
        })
    }

    /// Human readable listing, for debugging.
    fn dump(&self, out: &mut dyn Write) -> Result<()> {
        let mut lines = Vec::new();
        self.iter(&mut |station, var, dtrange, count| {
            lines.push(format!(
                "  {} {} {} {} {} {}",
                station, var.level, var.trange, var.varcode, dtrange, count
            ));
            true
        })?;
        writeln!(out, "Summary:")?;
        for line in lines {
            writeln!(out, "{}", line)?;
        }
        let min = self.datetime_min()?;
        let max = self.datetime_max()?;
        writeln!(
            out,
            "  datetime: {} to {}, count: {}",
            min.map_or_else(|| "-".to_string(), |dt| dt.to_string()),
            max.map_or_else(|| "-".to_string(), |dt| dt.to_string()),
            self.data_count()?
        )?;
        Ok(())
    }

    /// Direct access to in-memory content, for backends that have it.
    fn station_entries(&self) -> Option<&StationEntries<S>> {
        None
    }
}

/// Add the entries of `other` matching `query` to `dest`, one by one.
pub(crate) fn copy_entries<S, T, D>(dest: &mut D, other: &dyn Summary<T>, query: &Query) -> Result<()>
where
    S: StationLike,
    T: StationLike,
    D: Summary<S> + ?Sized,
{
    let mut failure: Option<SummaryError> = None;
    other.iter_filtered(query, &mut |station, var, dtrange, count| {
        match dest.add(&convert_station(station), var, dtrange, count) {
            Ok(()) => true,
            Err(err) => {
                failure = Some(err);
                false
            }
        }
    })?;
    failure.map_or(Ok(()), Err)
}
