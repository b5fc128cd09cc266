//! MVG API response DTOs.
//!
//! The departures endpoint returns a bare JSON array. Most fields are
//! optional in practice, so everything except the two timestamps is an
//! `Option` or defaulted.

use serde::Deserialize;
use serde_json::Value;

/// One entry from `/api/bgw-pt/v3/departures`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MvgDeparture {
    /// Scheduled departure, epoch milliseconds.
    pub planned_departure_time: i64,

    /// Live departure, epoch milliseconds. Equal to the planned time when
    /// there is no live data.
    pub realtime_departure_time: Option<i64>,

    pub delay_in_minutes: Option<i64>,

    /// Whether `realtime_departure_time` comes from live data.
    #[serde(default)]
    pub realtime: bool,

    /// Platform, sometimes numeric and sometimes text.
    pub platform: Option<Value>,

    /// Line label, e.g. "U2" or "S8".
    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub destination: String,

    /// Transport type enum, e.g. `UBAHN`, `SBAHN`, `REGIONAL_BUS`.
    #[serde(default)]
    pub transport_type: String,

    #[serde(default)]
    pub cancelled: bool,

    /// Service messages; either plain strings or objects with a `text` field.
    #[serde(default)]
    pub messages: Vec<Value>,

    pub stop_point_global_id: Option<String>,
}

/// One entry from `/api/bgw-pt/v3/locations`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MvgLocation {
    /// `STATION`, `ADDRESS`, `POI`, ...
    #[serde(rename = "type")]
    pub location_type: String,

    pub global_id: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub place: String,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,
}

/// One entry from `/api/bgw-pt/v3/stations/nearby`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MvgNearbyStation {
    pub global_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub place: String,

    #[serde(default)]
    pub latitude: f64,

    #[serde(default)]
    pub longitude: f64,

    /// Distance from the query point in metres.
    pub distance_in_meters: Option<f64>,
}
