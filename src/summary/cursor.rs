//! Cursor over the result of a summary query.

use std::fmt;

use crate::error::{Result, SummaryError};
use crate::station::StationLike;
use crate::summary::entry::{StationEntries, StationEntry, VarEntry};
use crate::types::{Datetime, DatetimeRange, Level, Trange, Varcode};

/// A field value read through [`SummaryCursor::enq`].
#[derive(Debug, Clone, PartialEq)]
pub enum EnqValue {
    Int(i64),
    Float(f64),
    Str(String),
    Missing,
}

impl EnqValue {
    fn opt_int(value: Option<i32>) -> Self {
        value.map_or(EnqValue::Missing, |v| EnqValue::Int(v as i64))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            EnqValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            EnqValue::Float(v) => Some(*v),
            EnqValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EnqValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, EnqValue::Missing)
    }
}

impl fmt::Display for EnqValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqValue::Int(v) => write!(f, "{}", v),
            EnqValue::Float(v) => write!(f, "{:.5}", v),
            EnqValue::Str(v) => f.write_str(v),
            EnqValue::Missing => f.write_str("-"),
        }
    }
}

/// Walks the (station, variable) pairs of a filtered summary copy, in
/// station order and then variable order.
///
/// A new cursor is positioned before the first entry: call
/// [`next`](Self::next) before reading fields.
pub struct SummaryCursor<S: StationLike> {
    results: StationEntries<S>,
    /// (station index, variable index) of the current entry.
    position: Option<(usize, usize)>,
    exhausted: bool,
    remaining: usize,
}

impl<S: StationLike> SummaryCursor<S> {
    pub fn new(mut results: StationEntries<S>) -> Self {
        results.rearrange();
        let remaining = results.len();
        Self {
            results,
            position: None,
            exhausted: false,
            remaining,
        }
    }

    /// Move to the next entry; false once the results are exhausted.
    pub fn next(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        let (mut station_idx, mut var_idx) = match self.position {
            None => (0, 0),
            Some((s, v)) => (s, v + 1),
        };
        loop {
            let Some(entry) = self.results.get(station_idx) else {
                self.discard();
                return false;
            };
            if var_idx < entry.vars.len() {
                self.position = Some((station_idx, var_idx));
                return true;
            }
            station_idx += 1;
            var_idx = 0;
            self.remaining = self.remaining.saturating_sub(1);
        }
    }

    /// Stations not yet fully walked. Only decreases when moving past a station.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Skip whatever is left.
    pub fn discard(&mut self) {
        self.exhausted = true;
        self.position = None;
        self.remaining = 0;
    }

    /// Everything the query matched.
    pub fn results(&self) -> &StationEntries<S> {
        &self.results
    }

    fn current(&self) -> Option<(&StationEntry<S>, &VarEntry)> {
        let (station_idx, var_idx) = self.position?;
        let entry = self.results.get(station_idx)?;
        Some((entry, entry.vars.get(var_idx)?))
    }

    fn positioned(&self) -> Result<(&StationEntry<S>, &VarEntry)> {
        self.current()
            .ok_or_else(|| SummaryError::NotFound("cursor is not positioned".to_string()))
    }

    pub fn station(&self) -> Option<&S> {
        self.current().map(|(entry, _)| &entry.station)
    }

    pub fn level(&self) -> Option<Level> {
        self.current().map(|(_, var)| var.var.level)
    }

    pub fn trange(&self) -> Option<Trange> {
        self.current().map(|(_, var)| var.var.trange)
    }

    pub fn varcode(&self) -> Option<Varcode> {
        self.current().map(|(_, var)| var.var.varcode)
    }

    pub fn dtrange(&self) -> Option<DatetimeRange> {
        self.current().map(|(_, var)| var.dtrange)
    }

    pub fn count(&self) -> Option<u64> {
        self.current().map(|(_, var)| var.count)
    }

    /// Read a field of the current entry by name.
    pub fn enq(&self, key: &str) -> Result<EnqValue> {
        let (entry, var) = self.positioned()?;
        let station = &entry.station;
        let value = match key {
            "rep_memo" | "report" => EnqValue::Str(station.report().to_string()),
            "ana_id" => EnqValue::opt_int(station.id()),
            "mobile" => EnqValue::Int(i64::from(station.ident().is_some())),
            "ident" => station
                .ident()
                .map_or(EnqValue::Missing, |ident| EnqValue::Str(ident.to_string())),
            "lat" => EnqValue::Float(station.coords().dlat()),
            "lon" => EnqValue::Float(station.coords().dlon()),
            "leveltype1" => EnqValue::opt_int(var.var.level.ltype1),
            "l1" => EnqValue::opt_int(var.var.level.l1),
            "leveltype2" => EnqValue::opt_int(var.var.level.ltype2),
            "l2" => EnqValue::opt_int(var.var.level.l2),
            "pindicator" => EnqValue::opt_int(var.var.trange.pind),
            "p1" => EnqValue::opt_int(var.var.trange.p1),
            "p2" => EnqValue::opt_int(var.var.trange.p2),
            "var" => EnqValue::Str(var.var.varcode.to_string()),
            "yearmin" | "monthmin" | "daymin" | "hourmin" | "minumin" | "secmin" => {
                datetime_field(var.dtrange.min, &key[..key.len() - 3])
            }
            "yearmax" | "monthmax" | "daymax" | "hourmax" | "minumax" | "secmax" => {
                datetime_field(var.dtrange.max, &key[..key.len() - 3])
            }
            "count" => EnqValue::Int(var.count as i64),
            _ => {
                return Err(SummaryError::NotFound(format!(
                    "summary cursor has no field {:?}",
                    key
                )))
            }
        };
        Ok(value)
    }
}

fn datetime_field(dt: Option<Datetime>, part: &str) -> EnqValue {
    let Some(dt) = dt else {
        return EnqValue::Missing;
    };
    let value = match part {
        "year" => dt.year() as i64,
        "month" => dt.month() as i64,
        "day" => dt.day() as i64,
        "hour" => dt.hour() as i64,
        "minu" => dt.minute() as i64,
        _ => dt.second() as i64,
    };
    EnqValue::Int(value)
}
