//! Application configuration.
//!
//! Loaded once at startup from a YAML file. Provider and profile names are
//! resolved into enums and limits are validated here, so that a bad file
//! fails at load time rather than on the first request.
//!
//! ```yaml
//! api_provider: mvg
//! poller:
//!   refresh_interval_seconds: 30
//! rate_limits:
//!   db: 2000
//! routes:
//!   - path: /
//!     stops:
//!       - station_id: de:09162:6
//!         station_name: Hauptbahnhof
//!         direction_mappings:
//!           West: [S1, S2 Petershausen]
//! ```

mod error;
mod file;

use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::domain::{HafasProfileName, ProviderKind, RouteConfiguration, StopConfiguration};
use crate::poller::PollerConfig;
use crate::rate_limit::RateLimitConfig;
use crate::repository::ProviderSettings;

pub use error::ConfigError;
use file::{ConfigFile, PollerSection, ProvidersSection, RateLimitSection, StopEntry};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "DEPARTURES_CONFIG";

/// Configuration file used when the environment variable is unset.
pub const DEFAULT_CONFIG_PATH: &str = "departures.yaml";

/// Largest accepted `departure_leeway_minutes`: one week.
const MAX_LEEWAY_MINUTES: i64 = 7 * 24 * 60;

/// Fully resolved application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Provider for stations that appear in no stop configuration.
    pub default_provider: ProviderKind,
    pub poller: PollerConfig,
    pub rate_limits: RateLimitConfig,
    pub providers: ProviderSettings,
    pub routes: Vec<RouteConfiguration>,
}

impl AppConfig {
    /// Read and resolve a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&text)?;
        info!(
            path = %path.display(),
            routes = config.routes.len(),
            stops = config.stop_configs().count(),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Resolve configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_yaml::from_str(text)?;
        Self::resolve(file)
    }

    /// Every configured stop across all routes.
    pub fn stop_configs(&self) -> impl Iterator<Item = &StopConfiguration> {
        self.routes.iter().flat_map(|r| r.stops.iter())
    }

    fn resolve(file: ConfigFile) -> Result<Self, ConfigError> {
        let default_provider = match &file.api_provider {
            Some(name) => parse_provider("api_provider", name)?,
            None => ProviderKind::default(),
        };
        let default_profile = match &file.hafas_profile {
            Some(name) => parse_profile("hafas_profile", name)?,
            None => HafasProfileName::default(),
        };
        let defaults = StopDefaults {
            provider: default_provider,
            hafas_profile: default_profile,
        };

        let mut routes: Vec<RouteConfiguration> = Vec::new();
        for (i, entry) in file.routes.into_iter().enumerate() {
            let location = format!("routes[{i}]");
            if routes.iter().any(|r| r.path == entry.path) {
                return Err(invalid(&location, "path", format!("'{}' is used twice", entry.path)));
            }

            let stops = entry
                .stops
                .into_iter()
                .enumerate()
                .map(|(j, stop)| resolve_stop(stop, &format!("{location}.stops[{j}]"), &defaults))
                .collect::<Result<Vec<_>, _>>()?;

            let mut route = RouteConfiguration::new(entry.path, stops);
            if let Some(secs) = entry.refresh_interval_seconds {
                route = route.with_refresh_interval(positive_secs(&location, "refresh_interval_seconds", secs)?);
            }
            routes.push(route);
        }

        if !file.stops.is_empty() {
            let stops = file
                .stops
                .into_iter()
                .enumerate()
                .map(|(j, stop)| resolve_stop(stop, &format!("stops[{j}]"), &defaults))
                .collect::<Result<Vec<_>, _>>()?;
            match routes.iter_mut().find(|r| r.path == "/") {
                Some(root) => root.stops.extend(stops),
                None => routes.insert(0, RouteConfiguration::new("/", stops)),
            }
        }

        Ok(Self {
            default_provider,
            poller: resolve_poller(file.poller)?,
            rate_limits: resolve_rate_limits(file.rate_limits),
            providers: resolve_providers(file.providers)?,
            routes,
        })
    }
}

struct StopDefaults {
    provider: ProviderKind,
    hafas_profile: HafasProfileName,
}

fn invalid(location: &str, field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        location: location.to_string(),
        field,
        message: message.into(),
    }
}

fn parse_provider(location: &str, name: &str) -> Result<ProviderKind, ConfigError> {
    ProviderKind::parse(name).map_err(|source| ConfigError::UnknownProvider {
        location: location.to_string(),
        source,
    })
}

fn parse_profile(location: &str, name: &str) -> Result<HafasProfileName, ConfigError> {
    HafasProfileName::parse(name).map_err(|source| ConfigError::UnknownHafasProfile {
        location: location.to_string(),
        source,
    })
}

fn at_least_one(location: &str, field: &'static str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(invalid(location, field, "must be at least 1"));
    }
    Ok(value)
}

fn positive_secs(location: &str, field: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(invalid(location, field, "must be at least 1 second"));
    }
    Ok(Duration::from_secs(secs))
}

fn resolve_stop(
    entry: StopEntry,
    location: &str,
    defaults: &StopDefaults,
) -> Result<StopConfiguration, ConfigError> {
    let station_id = entry
        .station_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ConfigError::MissingStationId {
            location: location.to_string(),
        })?;
    let station_name = entry
        .station_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| station_id.clone());

    let mut stop = StopConfiguration::new(station_id, station_name);
    stop.direction_mappings = entry.direction_mappings;
    stop.exclude_destinations = entry.exclude_destinations;
    stop.ungrouped_title = entry.ungrouped_title;
    stop.max_hours_in_advance = match entry.max_hours_in_advance {
        Some(hours) if !hours.is_finite() || hours < 0.0 => {
            return Err(invalid(
                location,
                "max_hours_in_advance",
                "must be a finite, non-negative number of hours",
            ));
        }
        hours => hours,
    };
    stop.platform_filter = entry.platform_filter;
    stop.platform_filter_routes = entry.platform_filter_routes;

    if let Some(n) = entry.max_departures_per_stop {
        stop.max_departures_per_stop = at_least_one(location, "max_departures_per_stop", n)?;
    }
    if let Some(n) = entry.max_departures_per_route {
        stop.max_departures_per_route = at_least_one(location, "max_departures_per_route", n)?;
    }
    if let Some(n) = entry.max_departures_fetch {
        stop.max_departures_fetch = at_least_one(location, "max_departures_fetch", n)?;
    }
    if let Some(show) = entry.show_ungrouped {
        stop.show_ungrouped = show;
    }
    if let Some(minutes) = entry.departure_leeway_minutes {
        if !(0..=MAX_LEEWAY_MINUTES).contains(&minutes) {
            return Err(invalid(
                location,
                "departure_leeway_minutes",
                format!("must be between 0 and {MAX_LEEWAY_MINUTES}"),
            ));
        }
        stop.departure_leeway_minutes = minutes;
    }
    if let Some(minutes) = entry.fetch_max_minutes_in_advance {
        if minutes == 0 {
            return Err(invalid(location, "fetch_max_minutes_in_advance", "must be at least 1"));
        }
        stop.fetch_max_minutes_in_advance = minutes;
    }

    stop.provider = match &entry.api_provider {
        Some(name) => parse_provider(location, name)?,
        None => defaults.provider,
    };
    stop.hafas_profile = match &entry.hafas_profile {
        Some(name) => parse_profile(location, name)?,
        None => defaults.hafas_profile,
    };

    Ok(stop)
}

fn resolve_poller(section: PollerSection) -> Result<PollerConfig, ConfigError> {
    let mut config = PollerConfig::default();
    let location = "poller";

    if let Some(secs) = section.refresh_interval_seconds {
        config.refresh_interval = positive_secs(location, "refresh_interval_seconds", secs)?;
    }
    if let Some(secs) = section.idle_interval_seconds {
        config.idle_interval = positive_secs(location, "idle_interval_seconds", secs)?;
    }
    if let Some(secs) = section.idle_grace_seconds {
        config.idle_grace = Duration::from_secs(secs);
    }
    if let Some(secs) = section.fetch_timeout_seconds {
        config.fetch_timeout = positive_secs(location, "fetch_timeout_seconds", secs)?;
    }
    if let Some(n) = section.fetch_limit {
        config.fetch_limit = at_least_one(location, "fetch_limit", n)?;
    }
    if let Some(n) = section.max_concurrent_fetches {
        config.max_concurrent_fetches = at_least_one(location, "max_concurrent_fetches", n)?;
    }

    Ok(config)
}

fn resolve_rate_limits(section: RateLimitSection) -> RateLimitConfig {
    let overrides = [
        (ProviderKind::Mvg, section.mvg),
        (ProviderKind::Db, section.db),
        (ProviderKind::Vbb, section.vbb),
        (ProviderKind::Hafas, section.hafas),
    ];

    overrides
        .into_iter()
        .fold(RateLimitConfig::default(), |config, (kind, ms)| {
            match ms.or(section.sleep_ms_between_calls) {
                Some(ms) => config.with_delay(kind, Duration::from_millis(ms)),
                None => config,
            }
        })
}

fn resolve_providers(section: ProvidersSection) -> Result<ProviderSettings, ConfigError> {
    let mut settings = ProviderSettings::default();
    let entries = [
        (ProviderKind::Mvg, section.mvg),
        (ProviderKind::Db, section.db),
        (ProviderKind::Vbb, section.vbb),
        (ProviderKind::Hafas, section.hafas),
    ];

    for (kind, entry) in entries {
        let Some(entry) = entry else { continue };
        let location = format!("providers.{kind}");
        let mut config = settings.for_kind(kind).clone();

        if let Some(url) = entry.base_url {
            config = config.with_base_url(url);
        }
        if let Some(secs) = entry.timeout_seconds {
            positive_secs(&location, "timeout_seconds", secs)?;
            config = config.with_timeout(secs);
        }
        if let Some(user_agent) = entry.user_agent {
            config = config.with_user_agent(user_agent);
        }
        *settings.for_kind_mut(kind) = config;
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HafasProfile;
    use std::io::Write;

    const FULL: &str = r#"
api_provider: mvg
hafas_profile: auto
poller:
  refresh_interval_seconds: 20
  idle_grace_seconds: 60
  fetch_limit: 80
rate_limits:
  sleep_ms_between_calls: 500
  db: 2000
providers:
  vbb:
    base_url: http://localhost:8080/
    timeout_seconds: 5
routes:
  - path: /
    stops:
      - station_id: de:09162:6
        station_name: Hauptbahnhof
        direction_mappings:
          West: [S1, S2 Petershausen]
          East: [Ostbahnhof]
        max_departures_per_stop: 6
        max_departures_per_route: 1
        exclude_destinations: [Pasing]
        departure_leeway_minutes: 3
        random_header_colors: true
  - path: /berlin
    refresh_interval_seconds: 60
    stops:
      - station_id: "900100003"
        api_provider: vbb
        api_duration_minutes: 90
      - station_id: "8011160"
        api_provider: hafas
        hafas_profile: bvg
        platform_filter: 9
        platform_filter_routes: [S7]
"#;

    #[test]
    fn resolves_full_file() {
        let config = AppConfig::from_yaml_str(FULL).unwrap();

        assert_eq!(config.default_provider, ProviderKind::Mvg);
        assert_eq!(config.poller.refresh_interval, Duration::from_secs(20));
        assert_eq!(config.poller.idle_grace, Duration::from_secs(60));
        assert_eq!(config.poller.idle_interval, Duration::from_secs(300));
        assert_eq!(config.poller.fetch_limit, 80);

        assert_eq!(config.rate_limits.mvg, Duration::from_millis(500));
        assert_eq!(config.rate_limits.db, Duration::from_millis(2000));

        assert_eq!(config.providers.vbb.base_url, "http://localhost:8080");
        assert_eq!(config.providers.vbb.timeout_secs, 5);
        assert_eq!(config.providers.mvg, ProviderSettings::default().mvg);

        assert_eq!(config.routes.len(), 2);
        let main = &config.routes[0].stops[0];
        let directions: Vec<&str> = main.direction_mappings.keys().map(String::as_str).collect();
        assert_eq!(directions, vec!["West", "East"]);
        assert_eq!(main.max_departures_per_stop, 6);
        assert_eq!(main.max_departures_per_route, 1);
        assert_eq!(main.departure_leeway_minutes, 3);
        assert_eq!(main.exclude_destinations, vec!["Pasing"]);
        assert_eq!(main.provider, ProviderKind::Mvg);

        let berlin = &config.routes[1];
        assert_eq!(berlin.refresh_interval, Some(Duration::from_secs(60)));
        assert_eq!(berlin.stops[0].provider, ProviderKind::Vbb);
        assert_eq!(berlin.stops[0].fetch_max_minutes_in_advance, 90);
        assert_eq!(berlin.stops[0].station_name, "900100003");
        assert_eq!(
            berlin.stops[1].hafas_profile,
            HafasProfileName::Named(HafasProfile::Bvg)
        );
        assert_eq!(berlin.stops[1].platform_filter, Some(9));

        assert_eq!(config.stop_configs().count(), 3);
    }

    #[test]
    fn stops_shorthand_becomes_root_route() {
        let config = AppConfig::from_yaml_str(
            r#"
stops:
  - station_id: de:09162:1
routes:
  - path: /work
    stops:
      - station_id: de:09162:2
"#,
        )
        .unwrap();

        let paths: Vec<&str> = config.routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/", "/work"]);
        assert_eq!(config.routes[0].stops[0].station_id, "de:09162:1");
    }

    #[test]
    fn defaults_when_sections_missing() {
        let config = AppConfig::from_yaml_str("stops: []").unwrap();

        assert_eq!(config.poller, PollerConfig::default());
        assert_eq!(config.rate_limits, RateLimitConfig::default());
        assert_eq!(config.providers, ProviderSettings::default());
        assert!(config.routes.is_empty());
    }

    #[test]
    fn unknown_provider_fails_fast() {
        let err = AppConfig::from_yaml_str(
            "stops:\n  - station_id: x\n    api_provider: sncf\n",
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::UnknownProvider { .. }));
        assert!(err.to_string().starts_with("stops[0]: unknown API provider 'sncf'"));
    }

    #[test]
    fn unknown_profile_fails_fast() {
        let err = AppConfig::from_yaml_str("hafas_profile: vvo\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownHafasProfile { .. }));
    }

    #[test]
    fn missing_station_id() {
        let err = AppConfig::from_yaml_str(
            "routes:\n  - path: /a\n    stops:\n      - station_name: Nowhere\n",
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::MissingStationId { .. }));
        assert_eq!(err.to_string(), "routes[0].stops[0]: station_id is required");
    }

    #[test]
    fn zero_caps_rejected() {
        let err = AppConfig::from_yaml_str(
            "stops:\n  - station_id: x\n    max_departures_per_route: 0\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { field: "max_departures_per_route", .. }
        ));

        let err = AppConfig::from_yaml_str("poller:\n  refresh_interval_seconds: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn out_of_range_time_bounds_rejected() {
        let err = AppConfig::from_yaml_str(
            "stops:\n  - station_id: x\n    departure_leeway_minutes: 9000000000000\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { field: "departure_leeway_minutes", .. }
        ));

        let err = AppConfig::from_yaml_str(
            "stops:\n  - station_id: x\n    departure_leeway_minutes: -5\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        for hours in [".inf", ".nan", "-2"] {
            let yaml = format!("stops:\n  - station_id: x\n    max_hours_in_advance: {hours}\n");
            let err = AppConfig::from_yaml_str(&yaml).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { field: "max_hours_in_advance", .. }),
                "{hours} accepted"
            );
        }

        let config = AppConfig::from_yaml_str(
            "stops:\n  - station_id: x\n    departure_leeway_minutes: 10080\n    max_hours_in_advance: 0.5\n",
        )
        .unwrap();
        let stop = &config.routes[0].stops[0];
        assert_eq!(stop.departure_leeway_minutes, 10080);
        assert_eq!(stop.max_hours_in_advance, Some(0.5));
    }

    #[test]
    fn duplicate_route_paths_rejected() {
        let err = AppConfig::from_yaml_str("routes:\n  - path: /a\n  - path: /a\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "path", .. }));
    }

    #[test]
    fn malformed_yaml() {
        let err = AppConfig::from_yaml_str("routes: [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.stop_configs().count(), 3);
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(dir.path().join("absent.yaml")).unwrap_err();

        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("absent.yaml"));
    }
}
