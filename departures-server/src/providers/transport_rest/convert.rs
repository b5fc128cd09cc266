//! Conversion from transport.rest DTOs to domain types.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::domain::{Departure, Station};

use super::types::{TrDeparture, TrLine, TrStop};

/// Error during DTO to domain conversion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    /// Failed to parse a timestamp
    #[error("invalid time: {0}")]
    InvalidTime(String),

    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Display name and icon for a product or mode name.
fn product_display(product: &str) -> Option<(&'static str, &'static str)> {
    let display = match product {
        "nationalExpress" => ("ICE", "mdi:train"),
        "national" => ("IC/EC", "mdi:train"),
        "regionalExpress" => ("RE", "mdi:train"),
        "regional" => ("RB", "mdi:train"),
        "suburban" => ("S-Bahn", "mdi:subway-variant"),
        "subway" => ("U-Bahn", "mdi:subway"),
        "tram" => ("Tram", "mdi:tram"),
        "bus" => ("Bus", "mdi:bus"),
        "ferry" => ("Ferry", "mdi:ferry"),
        "taxi" => ("Taxi", "mdi:taxi"),
        _ => return None,
    };
    Some(display)
}

/// Transport type display name and icon for a line.
///
/// Tries the mode, then the product, then guesses from the line name.
pub fn transport_type_for(line: &TrLine) -> (&'static str, &'static str) {
    if let Some(display) = product_display(&line.mode).or_else(|| product_display(&line.product))
    {
        return display;
    }

    let name = line.name.to_uppercase();
    let transport_type = if name.contains("ICE") {
        "ICE"
    } else if name.contains("IC") || name.contains("EC") {
        "IC/EC"
    } else if name.starts_with("RE") {
        "RE"
    } else if name.starts_with("RB") {
        "RB"
    } else if name.starts_with('S') {
        "S-Bahn"
    } else if name.contains("BUS") {
        "Bus"
    } else if name.contains("TRAM") {
        "Tram"
    } else if name.starts_with('U') {
        "U-Bahn"
    } else {
        "Train"
    };

    let icon = match transport_type {
        "S-Bahn" => "mdi:subway-variant",
        "U-Bahn" => "mdi:subway",
        "Bus" => "mdi:bus",
        "Tram" => "mdi:tram",
        _ => "mdi:train",
    };
    (transport_type, icon)
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, ConversionError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ConversionError::InvalidTime(s.to_string()))
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn remark_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(obj) => obj.get("text").and_then(value_text),
        other => value_text(other),
    }
}

/// Convert one departure.
pub fn convert_departure(raw: &TrDeparture) -> Result<Departure, ConversionError> {
    let planned = raw.planned_when.as_deref().map(parse_time).transpose()?;
    let live = raw.when.as_deref().map(parse_time).transpose()?;

    let planned_time = planned
        .or(live)
        .ok_or(ConversionError::MissingField("plannedWhen"))?;
    let time = live.unwrap_or(planned_time);

    let delay = raw.delay.or_else(|| {
        live.zip(planned)
            .map(|(live, planned)| (live - planned).num_seconds())
    });

    let (line, transport_type, icon) = match &raw.line {
        Some(l) => {
            let (transport_type, icon) = transport_type_for(l);
            (l.name.clone(), transport_type, icon)
        }
        None => (String::new(), "Train", "mdi:train"),
    };

    let destination = raw
        .direction
        .clone()
        .filter(|d| !d.is_empty())
        .or_else(|| raw.destination.as_ref().map(|d| d.name.clone()))
        .unwrap_or_default();

    Ok(Departure {
        time,
        planned_time,
        delay_seconds: delay.filter(|d| *d > 0),
        platform: raw
            .platform
            .as_ref()
            .or(raw.planned_platform.as_ref())
            .and_then(value_text),
        is_realtime: live.is_some(),
        line,
        destination,
        transport_type: transport_type.to_string(),
        icon: icon.to_string(),
        is_cancelled: raw.cancelled,
        messages: raw.remarks.iter().filter_map(remark_text).collect(),
        stop_point_id: raw
            .stop
            .as_ref()
            .and_then(|s| s.id.as_ref())
            .and_then(value_text),
    })
}

/// Convert departures, skipping entries that cannot be converted.
pub fn convert_departures(raw: &[TrDeparture]) -> Vec<Departure> {
    raw.iter()
        .filter_map(|d| match convert_departure(d) {
            Ok(dep) => Some(dep),
            Err(e) => {
                warn!(error = %e, "skipping transport.rest departure");
                None
            }
        })
        .collect()
}

/// Convert a stop or station. Entries without an id (addresses, POIs) are
/// dropped.
pub fn convert_stop(raw: &TrStop) -> Option<Station> {
    if raw.kind.as_deref() == Some("location") {
        return None;
    }
    let id = raw.id.as_ref().and_then(value_text)?;
    let (latitude, longitude) = raw
        .location
        .as_ref()
        .map(|l| (l.latitude.unwrap_or_default(), l.longitude.unwrap_or_default()))
        .unwrap_or_default();
    let name = if raw.name.is_empty() {
        id.clone()
    } else {
        raw.name.clone()
    };

    Some(Station::new(id, name, "", latitude, longitude))
}
