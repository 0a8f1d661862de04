//! Summary kept in memory, optionally saved to a JSON file.

use std::cell::{Cell, Ref, RefCell};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::query::Query;
use crate::smallset::SortedSmallUniqueValueSet;
use crate::station::{DBStation, Station, StationLike};
use crate::summary::entry::{StationEntries, VarDesc};
use crate::summary::json;
use crate::summary::{copy_entries, EntryVisitor, Summary, SummaryCursor};
use crate::types::{Datetime, DatetimeRange, Level, Trange, Varcode};

/// Aggregates derived from the entries, recomputed on demand.
#[derive(Debug, Default)]
struct DerivedStats {
    reports: SortedSmallUniqueValueSet<String>,
    levels: SortedSmallUniqueValueSet<Level>,
    tranges: SortedSmallUniqueValueSet<Trange>,
    varcodes: SortedSmallUniqueValueSet<Varcode>,
    dtrange: Option<DatetimeRange>,
    count: u64,
}

pub struct MemorySummary<S: StationLike> {
    entries: StationEntries<S>,
    path: Option<PathBuf>,
    stats: RefCell<DerivedStats>,
    /// Set when `entries` changed since `stats` was computed.
    dirty: Cell<bool>,
}

impl<S: StationLike> MemorySummary<S> {
    // -- Constructors -------------------------------------------------

    /// A summary that lives only in memory.
    pub fn new() -> Self {
        Self {
            entries: StationEntries::new(),
            path: None,
            stats: RefCell::new(DerivedStats::default()),
            dirty: Cell::new(false),
        }
    }

    /// A summary saved to `path` on commit, loading it first if it exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut summary = Self::new();
        if path.exists() {
            let file = File::open(&path)?;
            if let Err(err) = summary.load_json(&mut BufReader::new(file)) {
                tracing::warn!(path = %path.display(), error = %err, "Cannot load summary file");
                return Err(err);
            }
        }
        summary.path = Some(path);
        Ok(summary)
    }

    // -- Accessors ----------------------------------------------------

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn entries(&self) -> &StationEntries<S> {
        &self.entries
    }

    /// Content in sorted order.
    pub fn sorted_entries(&mut self) -> &StationEntries<S> {
        self.entries.rearrange();
        &self.entries
    }

    // -- Derived stats ------------------------------------------------

    fn invalidate(&self) {
        self.dirty.set(true);
    }

    /// Rebuild reports, levels, tranges, varcodes, datetime span and count
    /// in one pass over the entries. Stations without variables are left out.
    pub fn recompute_summaries(&self) {
        let mut stats = DerivedStats::default();
        for entry in self.entries.iter().filter(|e| !e.vars.is_empty()) {
            stats.reports.add(entry.station.report().to_string());
            for var in entry.vars.iter() {
                stats.levels.add(var.var.level);
                stats.tranges.add(var.var.trange);
                stats.varcodes.add(var.var.varcode);
                match &mut stats.dtrange {
                    Some(dtrange) => dtrange.merge(&var.dtrange),
                    None => stats.dtrange = Some(var.dtrange),
                }
                stats.count = stats.count.saturating_add(var.count);
            }
        }
        tracing::debug!(
            stations = self.entries.len(),
            reports = stats.reports.len(),
            varcodes = stats.varcodes.len(),
            count = stats.count,
            "Recomputed summary stats"
        );
        *self.stats.borrow_mut() = stats;
        self.dirty.set(false);
    }

    fn stats(&self) -> Ref<'_, DerivedStats> {
        if self.dirty.get() {
            self.recompute_summaries();
        }
        self.stats.borrow()
    }

    fn save(&self, path: &Path) -> Result<()> {
        let tmp_path = path.with_extension("json.tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp_path)?);
            json::write_entries(&mut out, &self.entries)?;
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        tracing::debug!(
            path = %path.display(),
            stations = self.entries.len(),
            "Saved summary"
        );
        Ok(())
    }
}

impl<S: StationLike> Default for MemorySummary<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StationLike> Summary<S> for MemorySummary<S> {
    fn stations(&self, dest: &mut dyn FnMut(&S) -> bool) -> Result<bool> {
        let mut stations: Vec<&S> = self
            .entries
            .iter()
            .filter(|e| !e.vars.is_empty())
            .map(|e| &e.station)
            .collect();
        stations.sort();
        Ok(stations.into_iter().all(|station| dest(station)))
    }

    fn reports(&self, dest: &mut dyn FnMut(&str) -> bool) -> Result<bool> {
        Ok(self.stats().reports.iter().all(|r| dest(r.as_str())))
    }

    fn levels(&self, dest: &mut dyn FnMut(&Level) -> bool) -> Result<bool> {
        Ok(self.stats().levels.iter().all(|l| dest(l)))
    }

    fn tranges(&self, dest: &mut dyn FnMut(&Trange) -> bool) -> Result<bool> {
        Ok(self.stats().tranges.iter().all(|t| dest(t)))
    }

    fn varcodes(&self, dest: &mut dyn FnMut(&Varcode) -> bool) -> Result<bool> {
        Ok(self.stats().varcodes.iter().all(|v| dest(v)))
    }

    fn datetime_min(&self) -> Result<Option<Datetime>> {
        Ok(self.stats().dtrange.and_then(|r| r.min))
    }

    fn datetime_max(&self) -> Result<Option<Datetime>> {
        Ok(self.stats().dtrange.and_then(|r| r.max))
    }

    fn data_count(&self) -> Result<u64> {
        Ok(self.stats().count)
    }

    fn query_summary(&self, query: &Query) -> Result<SummaryCursor<S>> {
        let mut results = StationEntries::new();
        results.add_filtered(&self.entries, query);
        Ok(SummaryCursor::new(results))
    }

    fn iter_filtered(&self, query: &Query, dest: &mut EntryVisitor<'_, S>) -> Result<bool> {
        Ok(self
            .entries
            .iter_filtered(query, |station, var| dest(station, &var.var, &var.dtrange, var.count)))
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.invalidate();
        Ok(())
    }

    fn add(&mut self, station: &S, var: &VarDesc, dtrange: &DatetimeRange, count: u64) -> Result<()> {
        self.entries.add(station, var, dtrange, count);
        self.invalidate();
        Ok(())
    }

    fn add_summary(&mut self, other: &dyn Summary<Station>) -> Result<()> {
        match other.station_entries() {
            Some(entries) => {
                self.entries.add_entries(entries);
                self.invalidate();
                Ok(())
            }
            None => copy_entries(self, other, &Query::new()),
        }
    }

    fn add_db_summary(&mut self, other: &dyn Summary<DBStation>) -> Result<()> {
        match other.station_entries() {
            Some(entries) => {
                self.entries.add_entries(entries);
                self.invalidate();
                Ok(())
            }
            None => copy_entries(self, other, &Query::new()),
        }
    }

    fn add_filtered(&mut self, other: &dyn Summary<S>, query: &Query) -> Result<()> {
        match other.station_entries() {
            Some(entries) => {
                self.entries.add_filtered(entries, query);
                self.invalidate();
                Ok(())
            }
            None => copy_entries(self, other, query),
        }
    }

    fn commit(&mut self) -> Result<()> {
        match &self.path {
            Some(path) => self.save(path),
            None => Ok(()),
        }
    }

    fn to_json(&self, out: &mut dyn Write) -> Result<()> {
        json::write_entries(out, &self.entries)
    }

    fn load_json(&mut self, input: &mut dyn Read) -> Result<()> {
        let entries = &mut self.entries;
        let res = json::load_entries(input, &mut |station: S, var| {
            entries.add_loaded(&station, var);
            Ok(())
        });
        self.invalidate();
        res
    }

    fn station_entries(&self) -> Option<&StationEntries<S>> {
        Some(&self.entries)
    }
}
