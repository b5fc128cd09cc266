//! Per-stop display configuration and grouping output.

use std::time::Duration;

use indexmap::IndexMap;

use super::departure::Departure;
use super::provider::{HafasProfileName, ProviderKind};

/// Default cap on departures per direction group.
pub const DEFAULT_MAX_DEPARTURES_PER_STOP: usize = 20;

/// Default cap on departures per line within a direction group.
pub const DEFAULT_MAX_DEPARTURES_PER_ROUTE: usize = 2;

/// Default number of raw departures requested from the provider.
pub const DEFAULT_MAX_DEPARTURES_FETCH: usize = 50;

/// Default look-ahead window for provider requests, in minutes.
pub const DEFAULT_FETCH_WINDOW_MINUTES: u32 = 60;

/// Title of the ungrouped bucket when no custom title is configured.
pub const DEFAULT_UNGROUPED_TITLE: &str = "Other";

/// How departures at one monitored stop are fetched, filtered and grouped.
///
/// Many stops may share one `station_id`; the poller fetches each station once
/// per cycle and every stop groups the shared snapshot with its own rules.
#[derive(Debug, Clone, PartialEq)]
pub struct StopConfiguration {
    /// Station (or stop point) identifier, scoped to `provider`.
    pub station_id: String,
    /// Display name of the stop.
    pub station_name: String,
    /// Direction name to whitelist patterns, in declaration order.
    pub direction_mappings: IndexMap<String, Vec<String>>,
    /// Maximum departures kept per direction group.
    pub max_departures_per_stop: usize,
    /// Maximum departures kept per line within a direction group.
    pub max_departures_per_route: usize,
    /// Whether departures matching no direction are shown at all.
    pub show_ungrouped: bool,
    /// Custom title for the ungrouped bucket.
    pub ungrouped_title: Option<String>,
    /// Departures leaving sooner than this many minutes from now are dropped.
    pub departure_leeway_minutes: i64,
    /// Departures further ahead than this are dropped. Values below one hour
    /// disable the filter.
    pub max_hours_in_advance: Option<f64>,
    /// Blacklist patterns, applied before classification.
    pub exclude_destinations: Vec<String>,
    /// Only keep departures from this platform number.
    pub platform_filter: Option<u32>,
    /// Lines the platform filter applies to. Empty means all lines.
    pub platform_filter_routes: Vec<String>,
    /// Upstream provider for this stop.
    pub provider: ProviderKind,
    /// HAFAS profile, only meaningful when `provider` is HAFAS.
    pub hafas_profile: HafasProfileName,
    /// Number of raw departures to request before grouping.
    pub max_departures_fetch: usize,
    /// Look-ahead window for provider requests, in minutes.
    pub fetch_max_minutes_in_advance: u32,
}

impl StopConfiguration {
    /// Create a configuration with default limits and no direction mappings.
    pub fn new(station_id: impl Into<String>, station_name: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            station_name: station_name.into(),
            direction_mappings: IndexMap::new(),
            max_departures_per_stop: DEFAULT_MAX_DEPARTURES_PER_STOP,
            max_departures_per_route: DEFAULT_MAX_DEPARTURES_PER_ROUTE,
            show_ungrouped: true,
            ungrouped_title: None,
            departure_leeway_minutes: 0,
            max_hours_in_advance: None,
            exclude_destinations: Vec::new(),
            platform_filter: None,
            platform_filter_routes: Vec::new(),
            provider: ProviderKind::default(),
            hafas_profile: HafasProfileName::default(),
            max_departures_fetch: DEFAULT_MAX_DEPARTURES_FETCH,
            fetch_max_minutes_in_advance: DEFAULT_FETCH_WINDOW_MINUTES,
        }
    }

    /// Append a direction with its whitelist patterns.
    pub fn with_direction<I, S>(mut self, name: impl Into<String>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.direction_mappings
            .insert(name.into(), patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Append blacklist patterns.
    pub fn with_excluded<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_destinations
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Set the provider.
    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    /// Set both caps.
    pub fn with_limits(mut self, per_stop: usize, per_route: usize) -> Self {
        self.max_departures_per_stop = per_stop;
        self.max_departures_per_route = per_route;
        self
    }

    /// Set the leeway in minutes.
    pub fn with_leeway(mut self, minutes: i64) -> Self {
        self.departure_leeway_minutes = minutes;
        self
    }

    /// Show or hide the ungrouped bucket.
    pub fn with_show_ungrouped(mut self, show: bool) -> Self {
        self.show_ungrouped = show;
        self
    }

    /// Title of the ungrouped bucket.
    pub fn ungrouped_title(&self) -> &str {
        self.ungrouped_title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_UNGROUPED_TITLE)
    }
}

/// A display route: a path plus the stops shown on it.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteConfiguration {
    /// URL path the web layer serves this route under (e.g. `/` or `/work`).
    pub path: String,
    /// Overrides the poller's default refresh interval for this route.
    pub refresh_interval: Option<Duration>,
    pub stops: Vec<StopConfiguration>,
}

impl RouteConfiguration {
    pub fn new(path: impl Into<String>, stops: Vec<StopConfiguration>) -> Self {
        Self {
            path: path.into(),
            refresh_interval: None,
            stops,
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }
}

/// One direction group ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedDepartures {
    pub direction_name: String,
    pub departures: Vec<Departure>,
}

impl GroupedDepartures {
    pub fn new(direction_name: impl Into<String>, departures: Vec<Departure>) -> Self {
        Self {
            direction_name: direction_name.into(),
            departures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let stop = StopConfiguration::new("de:09162:6", "Hauptbahnhof");

        assert_eq!(stop.max_departures_per_stop, 20);
        assert_eq!(stop.max_departures_per_route, 2);
        assert!(stop.show_ungrouped);
        assert_eq!(stop.provider, ProviderKind::Mvg);
        assert_eq!(stop.hafas_profile, HafasProfileName::Auto);
        assert_eq!(stop.ungrouped_title(), "Other");
    }

    #[test]
    fn directions_keep_declaration_order() {
        let stop = StopConfiguration::new("de:09162:6", "Hauptbahnhof")
            .with_direction("West", ["S1"])
            .with_direction("East", ["S2", "S8"])
            .with_direction("Airport", ["S8 Flughafen München"]);

        let names: Vec<&str> = stop.direction_mappings.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["West", "East", "Airport"]);
    }

    #[test]
    fn blank_custom_title_falls_back() {
        let mut stop = StopConfiguration::new("x", "X");
        stop.ungrouped_title = Some("  ".to_string());
        assert_eq!(stop.ungrouped_title(), "Other");

        stop.ungrouped_title = Some("Everything else".to_string());
        assert_eq!(stop.ungrouped_title(), "Everything else");
    }
}
