//! Observation descriptor value types.
//!
//! These are produced by the message codecs and the database query layer;
//! the summary index only compares, orders and serializes them. Missing
//! components are `None` and sort before any present value.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SummaryError};

// ── Constants ──────────────────────────────────────────────────────

/// Text layout used for datetimes in JSON and in debug dumps.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Coordinates are stored as integers in units of 1e-5 degrees.
pub const COORD_SCALE: f64 = 100_000.0;

fn fmt_opt(f: &mut fmt::Formatter<'_>, value: Option<i32>) -> fmt::Result {
    match value {
        Some(v) => write!(f, "{}", v),
        None => write!(f, "-"),
    }
}

// ── Level ──────────────────────────────────────────────────────────

/// Vertical level or layer of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "LevelRepr", into = "LevelRepr")]
pub struct Level {
    pub ltype1: Option<i32>,
    pub l1: Option<i32>,
    pub ltype2: Option<i32>,
    pub l2: Option<i32>,
}

#[derive(Serialize, Deserialize)]
struct LevelRepr(Option<i32>, Option<i32>, Option<i32>, Option<i32>);

impl From<LevelRepr> for Level {
    fn from(r: LevelRepr) -> Self {
        Level::new(r.0, r.1, r.2, r.3)
    }
}

impl From<Level> for LevelRepr {
    fn from(l: Level) -> Self {
        LevelRepr(l.ltype1, l.l1, l.ltype2, l.l2)
    }
}

impl Level {
    pub fn new(ltype1: Option<i32>, l1: Option<i32>, ltype2: Option<i32>, l2: Option<i32>) -> Self {
        Self { ltype1, l1, ltype2, l2 }
    }

    /// Level identified by its type only (e.g. `Level::of_type(1)` for ground).
    pub fn of_type(ltype1: i32) -> Self {
        Self::new(Some(ltype1), None, None, None)
    }

    /// Single level with a value (e.g. height above ground).
    pub fn single(ltype1: i32, l1: i32) -> Self {
        Self::new(Some(ltype1), Some(l1), None, None)
    }

    /// Layer between two levels.
    pub fn layer(ltype1: i32, l1: i32, ltype2: i32, l2: i32) -> Self {
        Self::new(Some(ltype1), Some(l1), Some(ltype2), Some(l2))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_opt(f, self.ltype1)?;
        write!(f, ",")?;
        fmt_opt(f, self.l1)?;
        write!(f, ",")?;
        fmt_opt(f, self.ltype2)?;
        write!(f, ",")?;
        fmt_opt(f, self.l2)
    }
}

// ── Trange ─────────────────────────────────────────────────────────

/// Time range of an observation (instantaneous, accumulated, averaged...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "TrangeRepr", into = "TrangeRepr")]
pub struct Trange {
    pub pind: Option<i32>,
    pub p1: Option<i32>,
    pub p2: Option<i32>,
}

#[derive(Serialize, Deserialize)]
struct TrangeRepr(Option<i32>, Option<i32>, Option<i32>);

impl From<TrangeRepr> for Trange {
    fn from(r: TrangeRepr) -> Self {
        Trange::new(r.0, r.1, r.2)
    }
}

impl From<Trange> for TrangeRepr {
    fn from(t: Trange) -> Self {
        TrangeRepr(t.pind, t.p1, t.p2)
    }
}

impl Trange {
    pub fn new(pind: Option<i32>, p1: Option<i32>, p2: Option<i32>) -> Self {
        Self { pind, p1, p2 }
    }

    /// Time range with all three components set.
    pub fn of(pind: i32, p1: i32, p2: i32) -> Self {
        Self::new(Some(pind), Some(p1), Some(p2))
    }

    /// Instantaneous value (`254,0,0`).
    pub fn instant() -> Self {
        Self::of(254, 0, 0)
    }
}

impl fmt::Display for Trange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_opt(f, self.pind)?;
        write!(f, ",")?;
        fmt_opt(f, self.p1)?;
        write!(f, ",")?;
        fmt_opt(f, self.p2)
    }
}

// ── Varcode ────────────────────────────────────────────────────────

/// WMO table descriptor, packed as F (2 bits), X (6 bits), Y (8 bits).
///
/// Text form is a letter for F (`B`, `R`, `C`, `D`) followed by two digits
/// of X and three digits of Y: `B12101` is air temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Varcode(u16);

impl Varcode {
    pub fn new(f: u8, x: u8, y: u8) -> Self {
        Varcode(((f as u16 & 0x3) << 14) | ((x as u16 & 0x3f) << 8) | y as u16)
    }

    /// Table B descriptor `B<x><y>`.
    pub fn b(x: u8, y: u8) -> Self {
        Self::new(0, x, y)
    }

    pub fn from_raw(raw: u16) -> Self {
        Varcode(raw)
    }

    pub fn raw(&self) -> u16 {
        self.0
    }

    pub fn f(&self) -> u8 {
        (self.0 >> 14) as u8
    }

    pub fn x(&self) -> u8 {
        ((self.0 >> 8) & 0x3f) as u8
    }

    pub fn y(&self) -> u8 {
        (self.0 & 0xff) as u8
    }
}

impl fmt::Display for Varcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self.f() {
            0 => 'B',
            1 => 'R',
            2 => 'C',
            _ => 'D',
        };
        write!(f, "{}{:02}{:03}", letter, self.x(), self.y())
    }
}

impl FromStr for Varcode {
    type Err = SummaryError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || SummaryError::Parse(format!("invalid varcode {:?}", s));
        if s.len() != 6 || !s.is_ascii() {
            return Err(bad());
        }
        let f = match s.as_bytes()[0] {
            b'B' => 0,
            b'R' => 1,
            b'C' => 2,
            b'D' => 3,
            _ => return Err(bad()),
        };
        let x: u8 = s[1..3].parse().map_err(|_| bad())?;
        let y: u8 = s[3..6].parse().map_err(|_| bad())?;
        if x > 63 {
            return Err(bad());
        }
        Ok(Varcode::new(f, x, y))
    }
}

impl Serialize for Varcode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Varcode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

// ── Datetime ───────────────────────────────────────────────────────

/// Observation datetime, second precision, no timezone (always UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Datetime(NaiveDateTime);

impl Datetime {
    pub fn new(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Result<Self> {
        chrono::NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, second))
            .map(Datetime)
            .ok_or_else(|| {
                SummaryError::Parse(format!(
                    "invalid datetime {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, minute, second
                ))
            })
    }

    /// Midnight of the given day.
    pub fn ymd(year: i32, month: u32, day: u32) -> Result<Self> {
        Self::new(year, month, day, 0, 0, 0)
    }

    /// Seconds since the Unix epoch. Sorts the same way as the datetime.
    pub fn timestamp(&self) -> i64 {
        self.0.and_utc().timestamp()
    }

    pub fn from_timestamp(secs: i64) -> Option<Self> {
        chrono::DateTime::from_timestamp(secs, 0).map(|dt| Datetime(dt.naive_utc()))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    pub fn second(&self) -> u32 {
        self.0.second()
    }
}

impl From<NaiveDateTime> for Datetime {
    fn from(dt: NaiveDateTime) -> Self {
        Datetime(dt)
    }
}

impl fmt::Display for Datetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATETIME_FORMAT))
    }
}

impl FromStr for Datetime {
    type Err = SummaryError;

    fn from_str(s: &str) -> Result<Self> {
        NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
            .map(Datetime)
            .map_err(|e| SummaryError::Parse(format!("invalid datetime {:?}: {}", s, e)))
    }
}

impl Serialize for Datetime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Datetime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

// ── DatetimeRange ──────────────────────────────────────────────────

/// Inclusive datetime interval. A `None` bound is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "DatetimeRangeRepr", into = "DatetimeRangeRepr")]
pub struct DatetimeRange {
    pub min: Option<Datetime>,
    pub max: Option<Datetime>,
}

#[derive(Serialize, Deserialize)]
struct DatetimeRangeRepr(Option<Datetime>, Option<Datetime>);

impl From<DatetimeRangeRepr> for DatetimeRange {
    fn from(r: DatetimeRangeRepr) -> Self {
        DatetimeRange::new(r.0, r.1)
    }
}

impl From<DatetimeRange> for DatetimeRangeRepr {
    fn from(r: DatetimeRange) -> Self {
        DatetimeRangeRepr(r.min, r.max)
    }
}

impl DatetimeRange {
    pub fn new(min: Option<Datetime>, max: Option<Datetime>) -> Self {
        Self { min, max }
    }

    pub fn between(min: Datetime, max: Datetime) -> Self {
        Self::new(Some(min), Some(max))
    }

    /// Range covering a single instant.
    pub fn point(dt: Datetime) -> Self {
        Self::new(Some(dt), Some(dt))
    }

    /// Range open on both ends: matches everything.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Extend this range to the union with `other`.
    ///
    /// An open bound on either side stays open.
    pub fn merge(&mut self, other: &DatetimeRange) {
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            _ => None,
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
    }

    /// True if the two ranges share at least one instant.
    pub fn intersects(&self, other: &DatetimeRange) -> bool {
        if let (Some(max), Some(other_min)) = (self.max, other.min) {
            if max < other_min {
                return false;
            }
        }
        if let (Some(other_max), Some(min)) = (other.max, self.min) {
            if other_max < min {
                return false;
            }
        }
        true
    }

    pub fn contains(&self, dt: &Datetime) -> bool {
        self.min.map_or(true, |min| min <= *dt) && self.max.map_or(true, |max| *dt <= max)
    }
}

impl fmt::Display for DatetimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.min {
            Some(dt) => write!(f, "{}", dt)?,
            None => write!(f, "-")?,
        }
        write!(f, " to ")?;
        match self.max {
            Some(dt) => write!(f, "{}", dt),
            None => write!(f, "-"),
        }
    }
}

// ── Coordinates ────────────────────────────────────────────────────

/// Station position in 1e-5 degree units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "CoordsRepr", into = "CoordsRepr")]
pub struct Coords {
    pub lat: i32,
    pub lon: i32,
}

#[derive(Serialize, Deserialize)]
struct CoordsRepr(i32, i32);

impl From<CoordsRepr> for Coords {
    fn from(r: CoordsRepr) -> Self {
        Coords::new(r.0, r.1)
    }
}

impl From<Coords> for CoordsRepr {
    fn from(c: Coords) -> Self {
        CoordsRepr(c.lat, c.lon)
    }
}

/// One full turn of longitude.
const LON_TURN: i64 = 36_000_000;

/// Bring a longitude into [-18000000, 18000000).
fn normalize_lon(lon: i32) -> i32 {
    (lon as i64 + LON_TURN / 2).rem_euclid(LON_TURN) as i32 - 18_000_000
}

impl Coords {
    pub fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon: normalize_lon(lon) }
    }

    pub fn from_degrees(lat: f64, lon: f64) -> Self {
        Self::new(
            (lat * COORD_SCALE).round() as i32,
            (lon * COORD_SCALE).round() as i32,
        )
    }

    pub fn dlat(&self) -> f64 {
        self.lat as f64 / COORD_SCALE
    }

    pub fn dlon(&self) -> f64 {
        self.lon as f64 / COORD_SCALE
    }
}

impl fmt::Display for Coords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.dlat(), self.dlon())
    }
}

/// Inclusive latitude interval in 1e-5 degree units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatRange {
    pub imin: i32,
    pub imax: i32,
}

impl LatRange {
    pub fn new(imin: i32, imax: i32) -> Self {
        Self { imin, imax }
    }

    pub fn from_degrees(min: f64, max: f64) -> Self {
        Self::new((min * COORD_SCALE).round() as i32, (max * COORD_SCALE).round() as i32)
    }

    pub fn contains(&self, lat: i32) -> bool {
        self.imin <= lat && lat <= self.imax
    }
}

/// Inclusive longitude interval in 1e-5 degree units.
///
/// When `imin > imax` the interval wraps across the antimeridian. A span
/// of a full turn or more becomes [`LonRange::full`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LonRange {
    pub imin: i32,
    pub imax: i32,
}

impl LonRange {
    pub fn new(imin: i32, imax: i32) -> Self {
        if imax as i64 - imin as i64 >= LON_TURN {
            return Self::full();
        }
        Self {
            imin: normalize_lon(imin),
            imax: normalize_lon(imax),
        }
    }

    /// Every longitude.
    pub fn full() -> Self {
        Self {
            imin: -18_000_000,
            imax: 17_999_999,
        }
    }

    pub fn is_full(&self) -> bool {
        *self == Self::full()
    }

    pub fn from_degrees(min: f64, max: f64) -> Self {
        Self::new((min * COORD_SCALE).round() as i32, (max * COORD_SCALE).round() as i32)
    }

    pub fn contains(&self, lon: i32) -> bool {
        if self.imin <= self.imax {
            self.imin <= lon && lon <= self.imax
        } else {
            lon >= self.imin || lon <= self.imax
        }
    }
}
