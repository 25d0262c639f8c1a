//! Wire types: the position events consumed, the stops they are matched
//! against, and the schedule events produced.
//!
//! All three are JSON with camelCase keys. Date-times travel as local
//! `yyyy-MM-ddTHH:mm:ss` and times of day as `HH:mm:ss`.

use std::fmt;

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A vehicle position report as delivered by the ingress stream.
///
/// Accepts the legacy producer's key names as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionEvent {
    #[serde(alias = "vehiculoId")]
    pub vehicle_id: String,
    #[serde(default, alias = "placaVehiculo")]
    pub plate_number: Option<String>,
    #[serde(alias = "latitud")]
    pub latitude: f64,
    #[serde(alias = "longitud")]
    pub longitude: f64,
    #[serde(alias = "velocidad")]
    pub speed_kmh: f64,
    #[serde(default, alias = "direccion")]
    pub address: Option<String>,
    #[serde(default, alias = "ciudad")]
    pub city: Option<String>,
    /// Free-text operational tag such as `EN_ROUTE` or `AT_STOP`.
    #[serde(default, alias = "estado")]
    pub status: Option<String>,
    #[serde(default, with = "optional_local_datetime")]
    pub timestamp: Option<NaiveDateTime>,
    #[serde(default, alias = "conductor")]
    pub driver: Option<String>,
    #[serde(default, alias = "pasajeros")]
    pub passenger_count: Option<u32>,
    #[serde(default, alias = "ruta")]
    pub route_id: Option<String>,
}

/// A known stop. The id is a single prefix character followed by a
/// zero-padded ordinal (`P001`); the ordinal doubles as the stop's position
/// along the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub stop_id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Stop {
    pub fn new(stop_id: &str, name: &str, address: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            stop_id: stop_id.to_string(),
            name: name.to_string(),
            address: address.to_string(),
            latitude,
            longitude,
        }
    }

    /// Parses the ordinal embedded in the stop id (`P001` -> 1).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStopId`] when the id has no numeric suffix or
    /// the suffix contains anything other than ASCII digits.
    pub fn sequence_number(&self) -> Result<u32> {
        let mut chars = self.stop_id.chars();
        chars.next();
        let digits = chars.as_str();

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidStopId(self.stop_id.clone()));
        }

        digits
            .parse()
            .map_err(|_| Error::InvalidStopId(self.stop_id.clone()))
    }
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) [{:.4}, {:.4}]",
            self.stop_id, self.name, self.latitude, self.longitude
        )
    }
}

/// Where a vehicle stands relative to the stop it was matched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Estimated,
    Arriving,
    Arrived,
    Passed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Estimated => "ESTIMATED",
            ScheduleStatus::Arriving => "ARRIVING",
            ScheduleStatus::Arrived => "ARRIVED",
            ScheduleStatus::Passed => "PASSED",
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A synthesized arrival record for one vehicle at one stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEvent {
    pub vehicle_id: String,
    pub plate_number: Option<String>,
    pub stop_id: String,
    pub stop_name: String,
    pub stop_address: String,
    #[serde(with = "time_of_day")]
    pub estimated_time: NaiveTime,
    #[serde(with = "time_of_day")]
    pub actual_time: NaiveTime,
    /// Whole minutes of `actual_time - estimated_time` on a 24h clock.
    pub delay_minutes: i64,
    #[serde(with = "local_datetime")]
    pub timestamp: NaiveDateTime,
    pub route_id: Option<String>,
    pub sequence_number: u32,
    pub status: ScheduleStatus,
}

impl ScheduleEvent {
    /// Composite identity of the (vehicle, stop) pair, `vehicleId-stopId`.
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.vehicle_id, &self.stop_id)
    }
}

pub fn dedup_key(vehicle_id: &str, stop_id: &str) -> String {
    format!("{vehicle_id}-{stop_id}")
}

const DATETIME_OUT: &str = "%Y-%m-%dT%H:%M:%S";
const DATETIME_IN: &str = "%Y-%m-%dT%H:%M:%S%.f";
const TIME_OUT: &str = "%H:%M:%S";
const TIME_IN: &str = "%H:%M:%S%.f";

mod local_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&value.format(super::DATETIME_OUT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, super::DATETIME_IN).map_err(serde::de::Error::custom)
    }
}

mod optional_local_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.collect_str(&v.format(super::DATETIME_OUT)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|raw| {
                NaiveDateTime::parse_from_str(&raw, super::DATETIME_IN)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}

mod time_of_day {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&value.format(super::TIME_OUT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, super::TIME_IN).map_err(serde::de::Error::custom)
    }
}
