//! YAML file shape.
//!
//! These structs mirror the file one to one and keep every field optional;
//! [`super::AppConfig`] resolves and validates them into runtime types.
//! Unknown keys (display options and the like) are ignored.

use indexmap::IndexMap;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Provider for stops that do not name one.
    #[serde(alias = "default_provider")]
    pub api_provider: Option<String>,
    /// HAFAS profile for HAFAS stops that do not name one.
    pub hafas_profile: Option<String>,
    pub poller: PollerSection,
    pub rate_limits: RateLimitSection,
    pub providers: ProvidersSection,
    pub routes: Vec<RouteEntry>,
    /// Shorthand for the stops of route `/`.
    pub stops: Vec<StopEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PollerSection {
    pub refresh_interval_seconds: Option<u64>,
    pub idle_interval_seconds: Option<u64>,
    pub idle_grace_seconds: Option<u64>,
    pub fetch_timeout_seconds: Option<u64>,
    pub fetch_limit: Option<usize>,
    pub max_concurrent_fetches: Option<usize>,
}

/// Minimum delays between calls, in milliseconds.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    /// Applies to every provider without its own value.
    pub sleep_ms_between_calls: Option<u64>,
    pub mvg: Option<u64>,
    pub db: Option<u64>,
    pub vbb: Option<u64>,
    pub hafas: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersSection {
    pub mvg: Option<ProviderEntry>,
    pub db: Option<ProviderEntry>,
    pub vbb: Option<ProviderEntry>,
    pub hafas: Option<ProviderEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProviderEntry {
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RouteEntry {
    #[serde(default = "root_path")]
    pub path: String,
    #[serde(default)]
    pub refresh_interval_seconds: Option<u64>,
    #[serde(default)]
    pub stops: Vec<StopEntry>,
}

fn root_path() -> String {
    "/".to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StopEntry {
    pub station_id: Option<String>,
    pub station_name: Option<String>,
    pub direction_mappings: IndexMap<String, Vec<String>>,
    pub max_departures_per_stop: Option<usize>,
    pub max_departures_per_route: Option<usize>,
    pub show_ungrouped: Option<bool>,
    pub ungrouped_title: Option<String>,
    pub departure_leeway_minutes: Option<i64>,
    pub max_hours_in_advance: Option<f64>,
    pub exclude_destinations: Vec<String>,
    pub platform_filter: Option<u32>,
    pub platform_filter_routes: Vec<String>,
    #[serde(alias = "provider")]
    pub api_provider: Option<String>,
    pub hafas_profile: Option<String>,
    pub max_departures_fetch: Option<usize>,
    #[serde(alias = "api_duration_minutes", alias = "vbb_api_duration_minutes")]
    pub fetch_max_minutes_in_advance: Option<u32>,
}
