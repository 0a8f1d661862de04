//! JSON summary format.
//!
//! ```text
//! {"e": [{"s": <station>,
//!         "v": [{"l": <level>, "t": <trange>, "v": <varcode>,
//!                "d": <dtrange>, "c": <count>}, ...]}, ...]}
//! ```
//!
//! Writing streams straight from `StationEntries`. Reading goes through
//! `DeserializeSeed` visitors that hand each variable to a sink as soon as
//! its station entry is parsed, so a load never builds a second copy of
//! the summary. A station listed with no variables reaches the sink once,
//! with `None`. Unknown keys are rejected, naming the key and where it was
//! found.

use std::fmt;
use std::io::{Read, Write};
use std::marker::PhantomData;

use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SummaryError};
use crate::station::StationLike;
use crate::summary::entry::{StationEntries, StationEntry, VarDesc, VarEntry};
use crate::types::{DatetimeRange, Level, Trange, Varcode};

/// Receives every (station, variable entry) read from JSON; the entry is
/// `None` for a station listed without variables.
pub type LoadSink<'a, S> = dyn FnMut(S, Option<VarEntry>) -> Result<()> + 'a;

// ── Writing ────────────────────────────────────────────────────────

struct JsonSummary<'a, S: StationLike>(&'a StationEntries<S>);

struct JsonStation<'a, S>(&'a StationEntry<S>);

struct JsonVars<'a>(Vec<&'a VarEntry>);

#[derive(Serialize)]
struct JsonVar<'a> {
    l: &'a Level,
    t: &'a Trange,
    v: &'a Varcode,
    d: &'a DatetimeRange,
    c: u64,
}

impl<S: StationLike> Serialize for JsonSummary<'_, S> {
    fn serialize<Z: Serializer>(&self, serializer: Z) -> std::result::Result<Z::Ok, Z::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("e", &JsonStations(self.0))?;
        map.end()
    }
}

struct JsonStations<'a, S: StationLike>(&'a StationEntries<S>);

impl<S: StationLike> Serialize for JsonStations<'_, S> {
    fn serialize<Z: Serializer>(&self, serializer: Z) -> std::result::Result<Z::Ok, Z::Error> {
        let entries = self.0.sorted_refs();
        let mut seq = serializer.serialize_seq(Some(entries.len()))?;
        for entry in entries {
            seq.serialize_element(&JsonStation(entry))?;
        }
        seq.end()
    }
}

impl<S: StationLike> Serialize for JsonStation<'_, S> {
    fn serialize<Z: Serializer>(&self, serializer: Z) -> std::result::Result<Z::Ok, Z::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("s", &self.0.station)?;
        map.serialize_entry("v", &JsonVars(self.0.vars.sorted_refs()))?;
        map.end()
    }
}

impl Serialize for JsonVars<'_> {
    fn serialize<Z: Serializer>(&self, serializer: Z) -> std::result::Result<Z::Ok, Z::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for var in &self.0 {
            seq.serialize_element(&JsonVar {
                l: &var.var.level,
                t: &var.var.trange,
                v: &var.var.varcode,
                d: &var.dtrange,
                c: var.count,
            })?;
        }
        seq.end()
    }
}

/// Write `entries` as summary JSON, stations and variables in key order.
pub fn write_entries<S: StationLike>(out: &mut dyn Write, entries: &StationEntries<S>) -> Result<()> {
    serde_json::to_writer(&mut *out, &JsonSummary(entries))?;
    out.flush()?;
    Ok(())
}

// ── Reading ────────────────────────────────────────────────────────

struct Loader<'a, 's, S> {
    sink: &'a mut LoadSink<'s, S>,
    /// Error raised by the sink, reported instead of the parser's abort.
    failure: Option<SummaryError>,
    stations: usize,
    vars: usize,
}

struct SummarySeed<'l, 'a, 's, S>(&'l mut Loader<'a, 's, S>);

impl<'de, S: StationLike> DeserializeSeed<'de> for SummarySeed<'_, '_, '_, S> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, S: StationLike> Visitor<'de> for SummarySeed<'_, '_, '_, S> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a summary object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<(), A::Error> {
        let loader = self.0;
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "e" => map.next_value_seed(StationListSeed(&mut *loader))?,
                other => {
                    return Err(de::Error::custom(format!(
                        "unknown key {:?} in summary",
                        other
                    )))
                }
            }
        }
        Ok(())
    }
}

struct StationListSeed<'l, 'a, 's, S>(&'l mut Loader<'a, 's, S>);

impl<'de, S: StationLike> DeserializeSeed<'de> for StationListSeed<'_, '_, '_, S> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, S: StationLike> Visitor<'de> for StationListSeed<'_, '_, '_, S> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of summary station entries")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<(), A::Error> {
        let loader = self.0;
        while seq.next_element_seed(StationEntrySeed(&mut *loader))?.is_some() {}
        Ok(())
    }
}

struct StationEntrySeed<'l, 'a, 's, S>(&'l mut Loader<'a, 's, S>);

impl<'de, S: StationLike> DeserializeSeed<'de> for StationEntrySeed<'_, '_, '_, S> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, S: StationLike> Visitor<'de> for StationEntrySeed<'_, '_, '_, S> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a summary station entry")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<(), A::Error> {
        let loader = self.0;
        let mut station: Option<S> = None;
        let mut vars: Vec<JsonVarItem> = Vec::new();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "s" => station = Some(map.next_value()?),
                "v" => vars = map.next_value()?,
                other => {
                    return Err(de::Error::custom(format!(
                        "unknown key {:?} in summary station entry",
                        other
                    )))
                }
            }
        }
        let station = station.ok_or_else(|| {
            <A::Error as de::Error>::custom("missing key \"s\" in summary station entry")
        })?;

        loader.stations += 1;
        let result = if vars.is_empty() {
            (loader.sink)(station, None)
        } else {
            loader.vars += vars.len();
            vars.into_iter().try_for_each(|item| {
                (loader.sink)(station.clone(), Some(VarEntry::new(item.var, item.dtrange, item.count)))
            })
        };
        if let Err(err) = result {
            loader.failure = Some(err);
            return Err(de::Error::custom("summary load aborted"));
        }
        Ok(())
    }
}

struct JsonVarItem {
    var: VarDesc,
    dtrange: DatetimeRange,
    count: u64,
}

impl<'de> Deserialize<'de> for JsonVarItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(JsonVarVisitor(PhantomData))
    }
}

struct JsonVarVisitor<'de>(PhantomData<&'de ()>);

impl<'de> Visitor<'de> for JsonVarVisitor<'de> {
    type Value = JsonVarItem;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a summary variable entry")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<JsonVarItem, A::Error> {
        let mut level: Option<Level> = None;
        let mut trange: Option<Trange> = None;
        let mut varcode: Option<Varcode> = None;
        let mut dtrange: Option<DatetimeRange> = None;
        let mut count: Option<u64> = None;
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "l" => level = Some(map.next_value()?),
                "t" => trange = Some(map.next_value()?),
                "v" => varcode = Some(map.next_value()?),
                "d" => dtrange = Some(map.next_value()?),
                "c" => count = Some(map.next_value()?),
                other => {
                    return Err(de::Error::custom(format!(
                        "unknown key {:?} in summary variable entry",
                        other
                    )))
                }
            }
        }
        let missing = |key: &str| {
            <A::Error as de::Error>::custom(format!("missing key {:?} in summary variable entry", key))
        };
        Ok(JsonVarItem {
            var: VarDesc::new(
                level.ok_or_else(|| missing("l"))?,
                trange.ok_or_else(|| missing("t"))?,
                varcode.ok_or_else(|| missing("v"))?,
            ),
            dtrange: dtrange.ok_or_else(|| missing("d"))?,
            count: count.ok_or_else(|| missing("c"))?,
        })
    }
}

/// Parse summary JSON from `input`, handing every variable to `sink`.
///
/// Stops at the first sink error and returns it.
pub fn load_entries<S: StationLike>(input: &mut dyn Read, sink: &mut LoadSink<'_, S>) -> Result<()> {
    let mut loader = Loader {
        sink,
        failure: None,
        stations: 0,
        vars: 0,
    };
    let mut deserializer = serde_json::Deserializer::from_reader(input);
    let parsed = SummarySeed(&mut loader)
        .deserialize(&mut deserializer)
        .and_then(|()| deserializer.end());
    if let Some(err) = loader.failure.take() {
        return Err(err);
    }
    parsed?;
    tracing::debug!(
        stations = loader.stations,
        vars = loader.vars,
        "Loaded summary JSON"
    );
    Ok(())
}

/// Parse summary JSON into a new `StationEntries`.
pub fn read_entries<S: StationLike>(input: &mut dyn Read) -> Result<StationEntries<S>> {
    let mut entries = StationEntries::new();
    load_entries(input, &mut |station: S, var| {
        entries.add_loaded(&station, var);
        Ok(())
    })?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::{DBStation, Station};
    use crate::types::{Coords, Datetime};

    fn sample() -> StationEntries<Station> {
        let mut entries = StationEntries::new();
        let when = DatetimeRange::between(
            Datetime::ymd(2020, 1, 1).unwrap(),
            Datetime::new(2020, 1, 2, 12, 0, 0).unwrap(),
        );
        let temp = VarDesc::new(Level::single(103, 2000), Trange::instant(), Varcode::b(12, 101));
        let wind = VarDesc::new(Level::single(103, 10000), Trange::of(200, 0, 600), Varcode::b(11, 2));
        entries.add(&Station::fixed("synop", Coords::new(4450000, 1130000)), &temp, &when, 3);
        entries.add(&Station::fixed("synop", Coords::new(4450000, 1130000)), &wind, &DatetimeRange::open(), 1);
        entries.add(&Station::mobile("ship", Coords::new(100, 200), "ABC"), &temp, &when, 2);
        entries
    }

    fn to_string(entries: &StationEntries<Station>) -> String {
        let mut buf = Vec::new();
        write_entries(&mut buf, entries).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_json_shape() {
        let mut entries = StationEntries::new();
        entries.add(
            &Station::fixed("synop", Coords::new(4450000, 1130000)),
            &VarDesc::new(Level::of_type(1), Trange::instant(), Varcode::b(12, 101)),
            &DatetimeRange::new(Some(Datetime::ymd(2020, 1, 1).unwrap()), None),
            7,
        );
        assert_eq!(
            to_string(&entries),
            r#"{"e":[{"s":{"r":"synop","c":[4450000,1130000],"i":null},"v":[{"l":[1,null,null,null],"t":[254,0,0],"v":"B12101","d":["2020-01-01 00:00:00",null],"c":7}]}]}"#
        );
    }

    #[test]
    fn test_round_trip() {
        let entries = sample();
        let json = to_string(&entries);
        let loaded: StationEntries<Station> = read_entries(&mut json.as_bytes()).unwrap();
        assert_eq!(loaded, entries);
    }

    #[test]
    fn test_round_trip_keeps_stations_without_variables() {
        let mut filtered = StationEntries::new();
        filtered.add_filtered(&sample(), &crate::query::Query::new().varcode(Varcode::b(1, 1)));
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.var_count(), 0);

        let json = to_string(&filtered);
        assert!(json.contains(r#""v":[]"#), "{}", json);
        let loaded: StationEntries<Station> = read_entries(&mut json.as_bytes()).unwrap();
        assert_eq!(loaded, filtered);
    }

    #[test]
    fn test_empty_station_reaches_sink_once() {
        let json = r#"{"e":[{"s":{"r":"synop","c":[0,0],"i":null},"v":[]}]}"#;
        let mut seen = Vec::new();
        load_entries::<Station>(&mut json.as_bytes(), &mut |station, var| {
            seen.push((station.report, var.is_none()));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![("synop".to_string(), true)]);
    }

    #[test]
    fn test_key_order_is_not_significant() {
        let json = r#"{"e":[{"v":[{"c":2,"d":[null,null],"v":"B01001","t":[254,0,0],"l":[1,null,null,null]}],"s":{"i":null,"c":[0,0],"r":"synop"}}]}"#;
        let loaded: StationEntries<Station> = read_entries(&mut json.as_bytes()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.var_count(), 1);
    }

    #[test]
    fn test_unknown_keys_are_named() {
        let cases = [
            (r#"{"x":[]}"#, "\"x\" in summary"),
            (r#"{"e":[{"s":{"r":"a","c":[0,0],"i":null},"q":1}]}"#, "\"q\" in summary station entry"),
            (
                r#"{"e":[{"s":{"r":"a","c":[0,0],"i":null},"v":[{"l":[1,null,null,null],"t":[254,0,0],"v":"B01001","d":[null,null],"c":1,"z":0}]}]}"#,
                "\"z\" in summary variable entry",
            ),
        ];
        for (json, expected) in cases {
            let err = read_entries::<Station>(&mut json.as_bytes()).unwrap_err();
            assert_eq!(err.code(), "JSON");
            assert!(err.to_string().contains(expected), "{} lacks {}", err, expected);
        }
    }

    #[test]
    fn test_missing_station_key() {
        let err = read_entries::<Station>(&mut r#"{"e":[{"v":[]}]}"#.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("missing key \"s\""));
    }

    #[test]
    fn test_db_station_ids_round_trip() {
        let mut entries = StationEntries::new();
        let station = DBStation::with_id(12, Station::fixed("synop", Coords::new(1, 2)));
        entries.add(
            &station,
            &VarDesc::new(Level::of_type(1), Trange::instant(), Varcode::b(12, 101)),
            &DatetimeRange::open(),
            1,
        );
        let mut buf = Vec::new();
        write_entries(&mut buf, &entries).unwrap();
        assert!(String::from_utf8_lossy(&buf).contains("\"id\":12"));
        let loaded: StationEntries<DBStation> = read_entries(&mut buf.as_slice()).unwrap();
        assert_eq!(loaded, entries);
    }

    #[test]
    fn test_sink_error_is_returned() {
        let json = to_string(&sample());
        let mut seen = 0;
        let err = load_entries::<Station>(&mut json.as_bytes(), &mut |_, _| {
            seen += 1;
            Err(SummaryError::Consistency("stop".into()))
        })
        .unwrap_err();
        assert_eq!(seen, 1);
        assert!(matches!(err, SummaryError::Consistency(msg) if msg == "stop"));
    }
}
