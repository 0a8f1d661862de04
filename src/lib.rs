//! obsarchive - summary index and dedup caches for an observation archive
//!
//! The archive stores meteorological observations keyed by station,
//! level, time range, variable code and datetime. This crate provides the
//! pieces that sit next to the data:
//!
//! - [`summary`]: what the archive holds, per station and variable, with
//!   time span and value count; in memory or in a term index
//! - [`cache`]: content-addressed caches of station and level/time-range
//!   ids used while importing
//! - [`termindex`]: the embedded term index the index backend runs on
//! - [`smallset`]: lazily sorted vector sets used throughout

pub mod cache;
pub mod config;
pub mod error;
pub mod query;
pub mod smallset;
pub mod station;
pub mod summary;
pub mod termindex;
pub mod types;

pub use config::{open_summary, BackendKind, SummaryConfig};
pub use error::{Result, SummaryError};
pub use query::Query;
pub use station::{DBStation, Station, StationLike};
pub use summary::{
    EnqValue, IndexSummary, MemorySummary, StationEntries, Summary, SummaryCursor, VarDesc,
    VarEntry,
};
pub use types::{Coords, Datetime, DatetimeRange, LatRange, Level, LonRange, Trange, Varcode};
