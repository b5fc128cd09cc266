//! Direction grouping of a flat departure list.
//!
//! Filters run before classification, and every group is capped only after
//! filtering, so a departure that is dropped never takes up a cap slot.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::domain::{
    DEFAULT_MAX_DEPARTURES_PER_ROUTE, DEFAULT_MAX_DEPARTURES_PER_STOP, Departure,
    GroupedDepartures, StopConfiguration, is_stop_point_id,
};

use super::matcher::{MatchKeys, normalize};

/// Group `departures` for one stop as of `now`.
///
/// Steps, in order:
/// 1. drop blacklisted departures
/// 2. keep only the configured stop point, if the station id is one
/// 3. apply the platform filter
/// 4. drop departures inside the leeway window
/// 5. drop departures beyond `max_hours_in_advance`
/// 6. classify by first matching direction, in declaration order
/// 7. per group: sort by time, remove duplicates, cap per line, cap per group
///
/// Empty groups are omitted; the ungrouped bucket comes last.
pub fn group_departures(
    departures: &[Departure],
    stop: &StopConfiguration,
    now: DateTime<Utc>,
) -> Vec<GroupedDepartures> {
    let remaining = filter_departures(departures, stop, now);

    if stop.direction_mappings.is_empty() {
        warn!(stop = %stop.station_name, "no direction mappings configured");
    }

    let mut groups: IndexMap<&str, Vec<Departure>> = stop
        .direction_mappings
        .keys()
        .map(|name| (name.as_str(), Vec::new()))
        .collect();
    let mut ungrouped = Vec::new();

    for departure in remaining {
        let keys = MatchKeys::new(&departure);
        let direction = stop
            .direction_mappings
            .iter()
            .find(|(_, patterns)| keys.matches_any(patterns))
            .map(|(name, _)| name.as_str());

        match direction.and_then(|name| groups.get_mut(name)) {
            Some(group) => group.push(departure),
            None => {
                debug!(
                    stop = %stop.station_name,
                    line = %departure.line,
                    destination = %departure.destination,
                    "departure matches no direction"
                );
                ungrouped.push(departure);
            }
        }
    }

    let mut result: Vec<GroupedDepartures> = groups
        .into_iter()
        .map(|(name, group)| GroupedDepartures::new(name, limit_group(group, stop)))
        .filter(|g| !g.departures.is_empty())
        .collect();

    if stop.show_ungrouped {
        let ungrouped = limit_group(ungrouped, stop);
        if !ungrouped.is_empty() {
            result.push(GroupedDepartures::new(stop.ungrouped_title(), ungrouped));
        }
    }

    result
}

/// Apply every per-departure filter.
fn filter_departures(
    departures: &[Departure],
    stop: &StopConfiguration,
    now: DateTime<Utc>,
) -> Vec<Departure> {
    let mut kept: Vec<Departure> = departures
        .iter()
        .filter(|d| !MatchKeys::new(d).matches_any(&stop.exclude_destinations))
        .cloned()
        .collect();

    let excluded = departures.len() - kept.len();
    if excluded > 0 {
        debug!(stop = %stop.station_name, excluded, "dropped blacklisted departures");
    }

    if is_stop_point_id(&stop.station_id) {
        let before = kept.len();
        let available: HashSet<&str> = kept
            .iter()
            .filter_map(|d| d.stop_point_id.as_deref())
            .collect();
        let available = format!("{available:?}");

        kept.retain(|d| d.stop_point_id.as_deref() == Some(stop.station_id.as_str()));
        if before > 0 && kept.is_empty() {
            warn!(
                stop_point = %stop.station_id,
                available = %available,
                "stop point filter matched no departures"
            );
        }
    }

    if let Some(platform) = stop.platform_filter {
        let before = kept.len();
        kept.retain(|d| !platform_filter_applies(stop, d) || platform_matches(d, platform));
        if before > 0 && kept.is_empty() {
            warn!(stop = %stop.station_name, platform, "platform filter matched no departures");
        }
    }

    if stop.departure_leeway_minutes > 0 {
        // A cutoff past the representable range leaves nothing outside the leeway.
        match Duration::try_minutes(stop.departure_leeway_minutes)
            .and_then(|leeway| now.checked_add_signed(leeway))
        {
            Some(cutoff) => kept.retain(|d| d.time >= cutoff),
            None => kept.clear(),
        }
    }

    if let Some(hours) = stop.max_hours_in_advance.filter(|h| *h >= 1.0) {
        // An unrepresentable horizon is no horizon.
        let limit = Duration::try_seconds((hours * 3600.0) as i64)
            .and_then(|ahead| now.checked_add_signed(ahead));
        if let Some(limit) = limit {
            kept.retain(|d| d.time <= limit);
        }
    }

    kept
}

fn platform_filter_applies(stop: &StopConfiguration, departure: &Departure) -> bool {
    if stop.platform_filter_routes.is_empty() {
        return true;
    }
    let line = normalize(&departure.line);
    stop.platform_filter_routes
        .iter()
        .any(|route| normalize(route) == line)
}

/// Whether a platform label names platform `number`.
///
/// Matches the bare number and the number as a standalone token
/// (`"Pos. 9"`, `"Platform 9"`, `"9, 10"`), but not as part of another
/// token such as a line name (`"2 (U9)"`) or a longer number (`"19"`).
pub fn platform_matches(departure: &Departure, number: u32) -> bool {
    let Some(platform) = departure.platform.as_deref().map(str::trim) else {
        return false;
    };
    let wanted = number.to_string();
    if platform == wanted {
        return true;
    }

    platform.match_indices(wanted.as_str()).any(|(start, _)| {
        let before = &platform[..start];
        let after = &platform[start + wanted.len()..];

        let starts_token = before.is_empty()
            || before.ends_with(char::is_whitespace)
            || before.ends_with("Pos.");
        let ends_token = after.is_empty()
            || after.starts_with(char::is_whitespace)
            || after.starts_with([')', ',']);

        starts_token && ends_token
    })
}

/// Sort, deduplicate and cap one direction group.
///
/// A zero cap falls back to the default.
fn limit_group(mut departures: Vec<Departure>, stop: &StopConfiguration) -> Vec<Departure> {
    let per_route = match stop.max_departures_per_route {
        0 => DEFAULT_MAX_DEPARTURES_PER_ROUTE,
        n => n,
    };
    let per_stop = match stop.max_departures_per_stop {
        0 => DEFAULT_MAX_DEPARTURES_PER_STOP,
        n => n,
    };

    departures.sort_by_key(|d| d.time);

    let mut seen = HashSet::new();
    let mut per_line: HashMap<String, usize> = HashMap::new();
    departures
        .into_iter()
        .filter(|d| seen.insert((d.line.clone(), d.destination.clone(), d.time)))
        .filter(|d| {
            let count = per_line.entry(d.line.clone()).or_insert(0);
            *count += 1;
            *count <= per_route
        })
        .take(per_stop)
        .collect()
}
