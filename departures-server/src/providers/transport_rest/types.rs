//! transport.rest (v6) response DTOs.
//!
//! Shared by `v6.db.transport.rest` and `v6.bvg.transport.rest`, which are
//! both FPTF-style wrappers around HAFAS.

use serde::Deserialize;
use serde_json::Value;

/// Response from `/stops/{id}/departures`.
///
/// Older deployments return a bare array instead of the wrapped object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DeparturesResponse {
    Wrapped { departures: Vec<TrDeparture> },
    Bare(Vec<TrDeparture>),
}

impl DeparturesResponse {
    pub fn into_departures(self) -> Vec<TrDeparture> {
        match self {
            DeparturesResponse::Wrapped { departures } | DeparturesResponse::Bare(departures) => {
                departures
            }
        }
    }
}

/// One departure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrDeparture {
    /// Live departure (ISO 8601); `null` when cancelled or unknown.
    pub when: Option<String>,

    /// Scheduled departure (ISO 8601).
    pub planned_when: Option<String>,

    /// Delay in seconds.
    pub delay: Option<i64>,

    /// Platform; numeric on some stations.
    pub platform: Option<Value>,

    pub planned_platform: Option<Value>,

    /// Headsign shown on the vehicle.
    pub direction: Option<String>,

    pub destination: Option<TrStop>,

    pub line: Option<TrLine>,

    #[serde(default)]
    pub remarks: Vec<Value>,

    #[serde(default)]
    pub cancelled: bool,

    /// Stop (platform/pole) the departure leaves from.
    pub stop: Option<TrStop>,
}

/// A line.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrLine {
    #[serde(default)]
    pub name: String,

    /// Product, e.g. `nationalExpress`, `suburban`, `bus`.
    #[serde(default)]
    pub product: String,

    /// Mode, e.g. `train`, `bus`.
    #[serde(default)]
    pub mode: String,
}

/// A stop, station or location.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrStop {
    /// `stop`, `station` or `location`.
    #[serde(rename = "type")]
    pub kind: Option<String>,

    /// Numeric on some deployments.
    pub id: Option<Value>,

    #[serde(default)]
    pub name: String,

    pub location: Option<TrLocation>,
}

/// Coordinates.
#[derive(Debug, Clone, Deserialize)]
pub struct TrLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}
