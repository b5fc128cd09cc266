//! Conversion from MVG DTOs to domain types.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::domain::{Departure, Station};

use super::types::{MvgDeparture, MvgLocation, MvgNearbyStation};

/// Error during DTO to domain conversion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    /// Timestamp out of range
    #[error("invalid timestamp: {0}")]
    InvalidTime(i64),
}

/// Display name and icon for an MVG transport type enum value.
///
/// Unknown values are passed through with an empty icon.
pub fn transport_type_display(raw: &str) -> (&str, &'static str) {
    match raw {
        "UBAHN" => ("U-Bahn", "mdi:subway"),
        "SBAHN" => ("S-Bahn", "mdi:subway-variant"),
        "BUS" => ("Bus", "mdi:bus"),
        "TRAM" => ("Tram", "mdi:tram"),
        "BAHN" => ("Bahn", "mdi:train"),
        "REGIONAL_BUS" => ("Regionalbus", "mdi:bus"),
        other => (other, ""),
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, ConversionError> {
    DateTime::from_timestamp_millis(ms).ok_or(ConversionError::InvalidTime(ms))
}

fn platform_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn message_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.as_str(),
        Value::Object(obj) => obj
            .get("text")
            .or_else(|| obj.get("title"))
            .and_then(Value::as_str)?,
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Convert one MVG departure.
pub fn convert_departure(raw: &MvgDeparture) -> Result<Departure, ConversionError> {
    let planned_time = from_millis(raw.planned_departure_time)?;
    let time = match raw.realtime_departure_time {
        Some(ms) => from_millis(ms)?,
        None => planned_time,
    };
    let (transport_type, icon) = transport_type_display(&raw.transport_type);

    Ok(Departure {
        time,
        planned_time,
        delay_seconds: raw.delay_in_minutes.map(|m| m * 60),
        platform: raw.platform.as_ref().and_then(platform_text),
        is_realtime: raw.realtime,
        line: raw.label.clone(),
        destination: raw.destination.clone(),
        transport_type: transport_type.to_string(),
        icon: icon.to_string(),
        is_cancelled: raw.cancelled,
        messages: raw.messages.iter().filter_map(message_text).collect(),
        stop_point_id: raw.stop_point_global_id.clone(),
    })
}

/// Convert a departures response, skipping entries that cannot be converted.
pub fn convert_departures(raw: &[MvgDeparture]) -> Vec<Departure> {
    raw.iter()
        .filter_map(|d| match convert_departure(d) {
            Ok(dep) => Some(dep),
            Err(e) => {
                warn!(line = %d.label, error = %e, "skipping MVG departure");
                None
            }
        })
        .collect()
}

/// Convert a location search result. Only stations with an id are kept.
pub fn convert_location(raw: &MvgLocation) -> Option<Station> {
    if raw.location_type != "STATION" {
        return None;
    }
    let id = raw.global_id.as_ref()?;
    Some(Station::new(
        id.clone(),
        raw.name.clone(),
        raw.place.clone(),
        raw.latitude.unwrap_or_default(),
        raw.longitude.unwrap_or_default(),
    ))
}

pub fn convert_nearby(raw: &MvgNearbyStation) -> Station {
    Station::new(
        raw.global_id.clone(),
        raw.name.clone(),
        raw.place.clone(),
        raw.latitude,
        raw.longitude,
    )
}
