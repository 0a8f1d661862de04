//! Station representations.
//!
//! A station is identified by its network (report), position and an
//! optional mobile identifier. `DBStation` additionally carries the
//! surrogate id assigned by the backing store. Summaries are generic over
//! either representation through [`StationLike`].

use std::fmt;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::Coords;

/// Capability shared by the station representations a summary can be keyed by.
pub trait StationLike:
    Clone + Ord + Hash + fmt::Debug + fmt::Display + Serialize + DeserializeOwned
{
    /// True if the representation carries a surrogate id that can be filtered on.
    const HAS_ID: bool;

    fn report(&self) -> &str;

    fn coords(&self) -> Coords;

    fn ident(&self) -> Option<&str>;

    /// Surrogate id, if this representation has one and it is set.
    fn id(&self) -> Option<i32>;

    fn to_db_station(&self) -> DBStation;

    fn from_db_station(station: DBStation) -> Self;
}

/// Convert between station representations.
///
/// Going to `Station` drops the id; going to `DBStation` from `Station`
/// leaves the id unset.
pub fn convert_station<T: StationLike, S: StationLike>(station: &T) -> S {
    S::from_db_station(station.to_db_station())
}

// ── Station ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Station {
    #[serde(rename = "r")]
    pub report: String,
    #[serde(rename = "c")]
    pub coords: Coords,
    #[serde(rename = "i")]
    pub ident: Option<String>,
}

impl Station {
    pub fn new(report: impl Into<String>, coords: Coords, ident: Option<String>) -> Self {
        Self {
            report: report.into(),
            coords,
            ident,
        }
    }

    /// Fixed station (no mobile identifier).
    pub fn fixed(report: impl Into<String>, coords: Coords) -> Self {
        Self::new(report, coords, None)
    }

    /// Mobile station, identified by `ident`.
    pub fn mobile(report: impl Into<String>, coords: Coords, ident: impl Into<String>) -> Self {
        Self::new(report, coords, Some(ident.into()))
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.report, self.coords)?;
        if let Some(ident) = &self.ident {
            write!(f, ":{}", ident)?;
        }
        Ok(())
    }
}

impl StationLike for Station {
    const HAS_ID: bool = false;

    fn report(&self) -> &str {
        &self.report
    }

    fn coords(&self) -> Coords {
        self.coords
    }

    fn ident(&self) -> Option<&str> {
        self.ident.as_deref()
    }

    fn id(&self) -> Option<i32> {
        None
    }

    fn to_db_station(&self) -> DBStation {
        DBStation::from(self.clone())
    }

    fn from_db_station(station: DBStation) -> Self {
        Station::from(station)
    }
}

// ── DBStation ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DBStation {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(rename = "r")]
    pub report: String,
    #[serde(rename = "c")]
    pub coords: Coords,
    #[serde(rename = "i")]
    pub ident: Option<String>,
}

impl DBStation {
    pub fn new(id: Option<i32>, report: impl Into<String>, coords: Coords, ident: Option<String>) -> Self {
        Self {
            id,
            report: report.into(),
            coords,
            ident,
        }
    }

    /// Attach a surrogate id to a bare station.
    pub fn with_id(id: i32, station: Station) -> Self {
        let mut res = DBStation::from(station);
        res.id = Some(id);
        res
    }

    /// The identity part of this station, without the id.
    pub fn station(&self) -> Station {
        Station::new(self.report.clone(), self.coords, self.ident.clone())
    }
}

impl From<Station> for DBStation {
    fn from(s: Station) -> Self {
        DBStation::new(None, s.report, s.coords, s.ident)
    }
}

impl From<DBStation> for Station {
    fn from(s: DBStation) -> Self {
        Station::new(s.report, s.coords, s.ident)
    }
}

impl fmt::Display for DBStation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}:", id)?,
            None => write!(f, "-:")?,
        }
        write!(f, "{}:{}", self.report, self.coords)?;
        if let Some(ident) = &self.ident {
            write!(f, ":{}", ident)?;
        }
        Ok(())
    }
}

impl StationLike for DBStation {
    const HAS_ID: bool = true;

    fn report(&self) -> &str {
        &self.report
    }

    fn coords(&self) -> Coords {
        self.coords
    }

    fn ident(&self) -> Option<&str> {
        self.ident.as_deref()
    }

    fn id(&self) -> Option<i32> {
        self.id
    }

    fn to_db_station(&self) -> DBStation {
        self.clone()
    }

    fn from_db_station(station: DBStation) -> Self {
        station
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synop() -> Station {
        Station::fixed("synop", Coords::from_degrees(44.5, 11.3))
    }

    #[test]
    fn test_conversion_drops_and_keeps_id() {
        let db = DBStation::with_id(7, synop());
        let bare: Station = convert_station(&db);
        assert_eq!(bare, synop());

        let back: DBStation = convert_station(&bare);
        assert_eq!(back.id, None);
        assert_eq!(back.station(), synop());

        let same: DBStation = convert_station(&db);
        assert_eq!(same.id, Some(7));
    }

    #[test]
    fn test_station_json_shape() {
        let json = serde_json::to_string(&Station::mobile("ship", Coords::new(100, 200), "ABC")).unwrap();
        assert_eq!(json, r#"{"r":"ship","c":[100,200],"i":"ABC"}"#);

        let db = DBStation::with_id(3, synop());
        let json = serde_json::to_string(&db).unwrap();
        assert!(json.starts_with(r#"{"id":3,"r":"synop""#));
    }

    #[test]
    fn test_station_json_rejects_unknown_keys() {
        let err = serde_json::from_str::<Station>(r#"{"r":"synop","c":[1,2],"i":null,"x":1}"#)
            .unwrap_err();
        assert!(err.to_string().contains("x"));
        // A bare station loads into the DB representation with no id
        let db: DBStation = serde_json::from_str(r#"{"r":"synop","c":[1,2],"i":null}"#).unwrap();
        assert_eq!(db.id, None);
    }

    #[test]
    fn test_has_id_flags() {
        assert!(!Station::HAS_ID);
        assert!(DBStation::HAS_ID);
        assert_eq!(synop().id(), None);
    }
}
