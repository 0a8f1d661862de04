//! Summary stored in a term index.
//!
//! Each (station, level, trange, varcode) combination is one document:
//!
//! ```text
//! terms:  S<station json>  L<level json>  T<trange json>  <varcode>
//! values: 0 = datetime min, 1 = datetime max, 2 = count
//! ```
//!
//! Datetimes are stored as Unix seconds, with `i64::MIN` and `i64::MAX`
//! standing for open bounds, so the index's own value bounds give the
//! global datetime span.

use std::marker::PhantomData;
use std::path::Path;

use crate::error::{Result, SummaryError};
use crate::query::Query;
use crate::smallset::SortedSmallUniqueValueSet;
use crate::station::StationLike;
use crate::summary::entry::{StationEntries, StationFilter, VarDesc};
use crate::summary::{EntryVisitor, Summary, SummaryCursor};
use crate::termindex::{Document, IndexQuery, MemoryIndex, TermIndex, ValueSlot};
use crate::types::{Datetime, DatetimeRange, Level, Trange, Varcode};

pub const SLOT_DATETIME_MIN: ValueSlot = 0;
pub const SLOT_DATETIME_MAX: ValueSlot = 1;
pub const SLOT_COUNT: ValueSlot = 2;

const STATION_PREFIX: &str = "S";
const LEVEL_PREFIX: &str = "L";
const TRANGE_PREFIX: &str = "T";

/// Varcode terms start with their F letter.
const VARCODE_PREFIXES: [&str; 4] = ["B", "R", "C", "D"];

// ── Term and value encoding ────────────────────────────────────────

fn station_term<S: StationLike>(station: &S) -> Result<String> {
    Ok(format!("{}{}", STATION_PREFIX, serde_json::to_string(station)?))
}

fn level_term(level: &Level) -> Result<String> {
    Ok(format!("{}{}", LEVEL_PREFIX, serde_json::to_string(level)?))
}

fn trange_term(trange: &Trange) -> Result<String> {
    Ok(format!("{}{}", TRANGE_PREFIX, serde_json::to_string(trange)?))
}

fn encode_min(dt: Option<Datetime>) -> i64 {
    dt.map_or(i64::MIN, |dt| dt.timestamp())
}

fn encode_max(dt: Option<Datetime>) -> i64 {
    dt.map_or(i64::MAX, |dt| dt.timestamp())
}

fn decode_bound(value: i64) -> Option<Datetime> {
    match value {
        i64::MIN | i64::MAX => None,
        secs => Datetime::from_timestamp(secs),
    }
}

/// A decoded summary document.
struct DecodedEntry<S> {
    station: S,
    var: VarDesc,
    dtrange: DatetimeRange,
    count: u64,
}

fn decode_document<S: StationLike>(doc: &Document) -> Result<DecodedEntry<S>> {
    let mut station = None;
    let mut level = None;
    let mut trange = None;
    let mut varcode = None;
    for term in doc.terms() {
        if let Some(json) = term.strip_prefix(STATION_PREFIX) {
            station = Some(serde_json::from_str::<S>(json)?);
        } else if let Some(json) = term.strip_prefix(LEVEL_PREFIX) {
            level = Some(serde_json::from_str::<Level>(json)?);
        } else if let Some(json) = term.strip_prefix(TRANGE_PREFIX) {
            trange = Some(serde_json::from_str::<Trange>(json)?);
        } else {
            varcode = Some(term.parse::<Varcode>()?);
        }
    }
    let incomplete = |what: &str| SummaryError::Consistency(format!("index document has no {} term", what));
    let min = doc.value(SLOT_DATETIME_MIN).unwrap_or(i64::MIN);
    let max = doc.value(SLOT_DATETIME_MAX).unwrap_or(i64::MAX);
    Ok(DecodedEntry {
        station: station.ok_or_else(|| incomplete("station"))?,
        var: VarDesc::new(
            level.ok_or_else(|| incomplete("level"))?,
            trange.ok_or_else(|| incomplete("trange"))?,
            varcode.ok_or_else(|| incomplete("varcode"))?,
        ),
        dtrange: DatetimeRange::new(decode_bound(min), decode_bound(max)),
        count: doc.value(SLOT_COUNT).unwrap_or(0).max(0) as u64,
    })
}

/// Decode every term under `prefix` and visit the distinct values in order.
fn visit_terms<T, F>(index: &MemoryIndex, prefixes: &[&str], decode: F, dest: &mut dyn FnMut(&T) -> bool) -> Result<bool>
where
    T: Ord,
    F: Fn(&str) -> Result<T>,
{
    let mut values = SortedSmallUniqueValueSet::new();
    for prefix in prefixes {
        for term in index.terms_with_prefix(prefix) {
            values.add(decode(term)?);
        }
    }
    Ok(values.iter().all(|value| dest(value)))
}

// ── IndexSummary ───────────────────────────────────────────────────

pub struct IndexSummary<S: StationLike> {
    index: TermIndex,
    _station: PhantomData<S>,
}

impl<S: StationLike> IndexSummary<S> {
    /// A summary over a volatile in-memory index.
    pub fn in_memory() -> Self {
        Self {
            index: TermIndex::in_memory(),
            _station: PhantomData,
        }
    }

    /// A summary over an index directory. Changes are visible to queries
    /// only after [`Summary::commit`].
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            index: TermIndex::open(dir)?,
            _station: PhantomData,
        })
    }

    pub fn is_persistent(&self) -> bool {
        self.index.is_persistent()
    }

    /// Reload the committed state on the next query.
    pub fn refresh(&self) {
        self.index.refresh_reader();
    }

    fn search(&self, query: &Query, dest: &mut EntryVisitor<'_, S>) -> Result<bool> {
        self.index.with_reader(|reader| -> Result<bool> {
            let mut groups: Vec<Vec<String>> = Vec::new();

            let station_filter = StationFilter::<S>::new(query);
            if station_filter.is_active() {
                let mut whitelist = Vec::new();
                for term in reader.terms_with_prefix(STATION_PREFIX) {
                    let station: S = serde_json::from_str(&term[STATION_PREFIX.len()..])?;
                    if station_filter.matches(&station) {
                        whitelist.push(term.to_string());
                    }
                }
                if whitelist.is_empty() {
                    return Ok(true);
                }
                groups.push(whitelist);
            }
            if let Some(level) = &query.level {
                groups.push(vec![level_term(level)?]);
            }
            if let Some(trange) = &query.trange {
                groups.push(vec![trange_term(trange)?]);
            }
            if !query.varcodes.is_empty() {
                groups.push(query.varcodes.iter().map(Varcode::to_string).collect());
            }

            for id in reader.search(&IndexQuery::and_of_ors(groups)) {
                let Some(doc) = reader.document(id) else {
                    continue;
                };
                let entry = decode_document::<S>(doc)?;
                if !query.datetime.intersects(&entry.dtrange) {
                    continue;
                }
                if !dest(&entry.station, &entry.var, &entry.dtrange, entry.count) {
                    return Ok(false);
                }
            }
            Ok(true)
        })?
    }
}

impl<S: StationLike> Summary<S> for IndexSummary<S> {
    fn stations(&self, dest: &mut dyn FnMut(&S) -> bool) -> Result<bool> {
        self.index.with_reader(|reader| {
            visit_terms(
                reader,
                &[STATION_PREFIX],
                |term| Ok(serde_json::from_str::<S>(&term[STATION_PREFIX.len()..])?),
                dest,
            )
        })?
    }

    fn reports(&self, dest: &mut dyn FnMut(&str) -> bool) -> Result<bool> {
        self.index.with_reader(|reader| -> Result<bool> {
            let mut reports = SortedSmallUniqueValueSet::new();
            for term in reader.terms_with_prefix(STATION_PREFIX) {
                let station: S = serde_json::from_str(&term[STATION_PREFIX.len()..])?;
                reports.add(station.report().to_string());
            }
            Ok(reports.iter().all(|report| dest(report.as_str())))
        })?
    }

    fn levels(&self, dest: &mut dyn FnMut(&Level) -> bool) -> Result<bool> {
        self.index.with_reader(|reader| {
            visit_terms(
                reader,
                &[LEVEL_PREFIX],
                |term| Ok(serde_json::from_str::<Level>(&term[LEVEL_PREFIX.len()..])?),
                dest,
            )
        })?
    }

    fn tranges(&self, dest: &mut dyn FnMut(&Trange) -> bool) -> Result<bool> {
        self.index.with_reader(|reader| {
            visit_terms(
                reader,
                &[TRANGE_PREFIX],
                |term| Ok(serde_json::from_str::<Trange>(&term[TRANGE_PREFIX.len()..])?),
                dest,
            )
        })?
    }

    fn varcodes(&self, dest: &mut dyn FnMut(&Varcode) -> bool) -> Result<bool> {
        self.index.with_reader(|reader| {
            visit_terms(reader, &VARCODE_PREFIXES, |term| term.parse::<Varcode>(), dest)
        })?
    }

    fn datetime_min(&self) -> Result<Option<Datetime>> {
        let lower = self
            .index
            .with_reader(|reader| reader.value_lower_bound(SLOT_DATETIME_MIN))?;
        Ok(lower.and_then(decode_bound))
    }

    fn datetime_max(&self) -> Result<Option<Datetime>> {
        let upper = self
            .index
            .with_reader(|reader| reader.value_upper_bound(SLOT_DATETIME_MAX))?;
        Ok(upper.and_then(decode_bound))
    }

    fn data_count(&self) -> Result<u64> {
        let sum = self.index.with_reader(|reader| reader.value_sum(SLOT_COUNT))?;
        Ok(sum.max(0) as u64)
    }

    fn query_summary(&self, query: &Query) -> Result<SummaryCursor<S>> {
        let mut results = StationEntries::new();
        self.search(query, &mut |station, var, dtrange, count| {
            results.add(station, var, dtrange, count);
            true
        })?;
        Ok(SummaryCursor::new(results))
    }

    fn iter_filtered(&self, query: &Query, dest: &mut EntryVisitor<'_, S>) -> Result<bool> {
        self.search(query, dest)
    }

    fn clear(&mut self) -> Result<()> {
        self.index.clear();
        Ok(())
    }

    fn add(&mut self, station: &S, var: &VarDesc, dtrange: &DatetimeRange, count: u64) -> Result<()> {
        let terms = [
            station_term(station)?,
            level_term(&var.level)?,
            trange_term(&var.trange)?,
            var.varcode.to_string(),
        ];
        let writer = self.index.writer()?;
        let count = i64::try_from(count)
            .map_err(|_| SummaryError::Consistency(format!("count {} does not fit the index", count)))?;

        match writer.find_exact(&terms) {
            Some(id) => {
                let mut doc = writer
                    .document(id)
                    .cloned()
                    .ok_or_else(|| SummaryError::Consistency(format!("index lost document {}", id)))?;
                let min = doc.value(SLOT_DATETIME_MIN).unwrap_or(i64::MIN);
                let max = doc.value(SLOT_DATETIME_MAX).unwrap_or(i64::MAX);
                let total = doc.value(SLOT_COUNT).unwrap_or(0);
                doc.set_value(SLOT_DATETIME_MIN, min.min(encode_min(dtrange.min)));
                doc.set_value(SLOT_DATETIME_MAX, max.max(encode_max(dtrange.max)));
                doc.set_value(SLOT_COUNT, total.saturating_add(count));
                writer.replace_document(id, doc)?;
            }
            None => {
                let mut doc = Document::with_terms(terms);
                doc.set_value(SLOT_DATETIME_MIN, encode_min(dtrange.min));
                doc.set_value(SLOT_DATETIME_MAX, encode_max(dtrange.max));
                doc.set_value(SLOT_COUNT, count);
                writer.add_document(doc);
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.index.commit()?;
        Ok(())
    }
}
