//! Conversion from HAFAS DTOs to domain types.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::domain::{Departure, Station};

use super::profile::ProfileConstants;
use super::types::{Common, Journey, Location, StationBoardResult};

/// Error during DTO to domain conversion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    /// Failed to parse a date or time string
    #[error("invalid time: {0}")]
    InvalidTime(String),

    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Parse a station board time relative to the journey date.
///
/// `time` is `HHMMSS` or `DDHHMMSS`, where `DD` is a day offset for journeys
/// that run past midnight. The result is resolved in the profile's zone.
pub fn parse_board_time(date: &str, time: &str, tz: Tz) -> Result<DateTime<Utc>, ConversionError> {
    let invalid = || ConversionError::InvalidTime(format!("{date} {time}"));

    let date = NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| invalid())?;
    if !time.is_ascii() {
        return Err(invalid());
    }
    let (days, hms) = match time.len() {
        6 => (0, time),
        8 => (time[..2].parse::<u64>().map_err(|_| invalid())?, &time[2..]),
        _ => return Err(invalid()),
    };
    let hms = NaiveTime::parse_from_str(hms, "%H%M%S").map_err(|_| invalid())?;
    let date = date.checked_add_days(Days::new(days)).ok_or_else(invalid)?;

    // `earliest` picks the first instant of an ambiguous (DST fall-back) time.
    tz.from_local_datetime(&date.and_time(hms))
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(invalid)
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Convert one journey of a station board.
pub fn convert_journey(
    jny: &Journey,
    common: &Common,
    profile: &ProfileConstants,
) -> Result<Departure, ConversionError> {
    let stop = &jny.stb_stop;
    let planned = stop
        .d_time_s
        .as_deref()
        .ok_or(ConversionError::MissingField("dTimeS"))?;
    let planned_time = parse_board_time(&jny.date, planned, profile.timezone)?;
    let live_time = stop
        .d_time_r
        .as_deref()
        .map(|t| parse_board_time(&jny.date, t, profile.timezone))
        .transpose()?;

    let product = jny.prod_x.and_then(|i| common.prod_l.get(i));
    let line = product
        .and_then(|p| non_empty(p.name_s.as_deref()).or_else(|| non_empty(p.name.as_deref())))
        .unwrap_or_default();
    let (transport_type, icon) = product
        .and_then(|p| p.cls)
        .and_then(|cls| profile.product(cls))
        .map(|p| (p.display, p.icon))
        .unwrap_or(("Unknown", ""));

    let platform = non_empty(stop.d_pltf_r.as_ref().and_then(|p| p.txt.as_deref()))
        .or_else(|| non_empty(stop.d_platf_r.as_deref()))
        .or_else(|| non_empty(stop.d_pltf_s.as_ref().and_then(|p| p.txt.as_deref())))
        .or_else(|| non_empty(stop.d_platf_s.as_deref()));

    let messages = jny
        .msg_l
        .iter()
        .filter(|m| m.kind.as_deref() == Some("REM"))
        .filter_map(|m| m.rem_x.and_then(|i| common.rem_l.get(i)))
        .filter_map(|r| non_empty(r.txt_n.as_deref()))
        .collect();

    let stop_point_id = stop
        .loc_x
        .and_then(|i| common.loc_l.get(i))
        .and_then(|l| l.ext_id.clone());

    Ok(Departure {
        time: live_time.unwrap_or(planned_time),
        planned_time,
        delay_seconds: live_time.map(|live| (live - planned_time).num_seconds()),
        platform,
        is_realtime: live_time.is_some(),
        line,
        destination: non_empty(jny.dir_txt.as_deref()).unwrap_or_default(),
        transport_type: transport_type.to_string(),
        icon: icon.to_string(),
        is_cancelled: jny.is_cncl || stop.d_cncl,
        messages,
        stop_point_id,
    })
}

/// Convert a station board, skipping journeys that cannot be converted.
pub fn convert_board(board: &StationBoardResult, profile: &ProfileConstants) -> Vec<Departure> {
    board
        .jny_l
        .iter()
        .filter_map(|jny| match convert_journey(jny, &board.common, profile) {
            Ok(dep) => Some(dep),
            Err(e) => {
                warn!(profile = %profile.name, error = %e, "skipping HAFAS journey");
                None
            }
        })
        .collect()
}

/// Convert a location. Only stations (`type == "S"`) with an external id
/// are kept.
pub fn convert_location(loc: &Location) -> Option<Station> {
    if loc.kind.as_deref() != Some("S") {
        return None;
    }
    let id = loc.ext_id.clone()?;
    let name = loc.name.clone().unwrap_or_else(|| id.clone());
    let (latitude, longitude) = loc
        .crd
        .map(|c| (c.y as f64 / 1_000_000.0, c.x as f64 / 1_000_000.0))
        .unwrap_or_default();

    Some(Station::new(id, name, "", latitude, longitude))
}
