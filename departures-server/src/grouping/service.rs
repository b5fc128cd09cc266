//! Fetch-then-group entry points used by the web layer.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::cache::DepartureCache;
use crate::domain::{Departure, GroupedDepartures, StopConfiguration};
use crate::providers::ProviderError;
use crate::repository::DepartureRepository;

use super::engine;

/// Cached departures older than this are ignored.
const STALE_AFTER_HOURS: i64 = 1;

/// Groups departures for configured stops.
pub struct DepartureGroupingService {
    repository: Arc<dyn DepartureRepository>,
}

impl DepartureGroupingService {
    pub fn new(repository: Arc<dyn DepartureRepository>) -> Self {
        Self { repository }
    }

    /// Fetch departures for `stop` and group them.
    pub async fn get_grouped_departures(
        &self,
        stop: &StopConfiguration,
    ) -> Result<Vec<GroupedDepartures>, ProviderError> {
        let departures = self
            .repository
            .get_departures(&stop.station_id, stop.max_departures_fetch)
            .await?;
        Ok(self.group_departures(&departures, stop))
    }

    /// Group already fetched departures, for stations shared by several stops.
    pub fn group_departures(
        &self,
        departures: &[Departure],
        stop: &StopConfiguration,
    ) -> Vec<GroupedDepartures> {
        engine::group_departures(departures, stop, Utc::now())
    }

    /// Group the cached snapshot for `stop`'s station.
    ///
    /// Departures more than an hour in the past are discarded first. If
    /// nothing usable is cached the departures are fetched directly.
    pub async fn grouped_from_cache(
        &self,
        cache: &dyn DepartureCache,
        stop: &StopConfiguration,
    ) -> Result<Vec<GroupedDepartures>, ProviderError> {
        self.grouped_from_cache_at(cache, stop, Utc::now()).await
    }

    async fn grouped_from_cache_at(
        &self,
        cache: &dyn DepartureCache,
        stop: &StopConfiguration,
        now: DateTime<Utc>,
    ) -> Result<Vec<GroupedDepartures>, ProviderError> {
        let snapshot = cache.get(&stop.station_id).await;
        let oldest = now - Duration::hours(STALE_AFTER_HOURS);
        let fresh: Vec<Departure> = snapshot
            .iter()
            .filter(|d| d.time >= oldest)
            .cloned()
            .collect();

        if fresh.is_empty() {
            debug!(station = %stop.station_id, cached = snapshot.len(), "no fresh cached departures, fetching");
            let departures = self
                .repository
                .get_departures(&stop.station_id, stop.max_departures_fetch)
                .await?;
            return Ok(engine::group_departures(&departures, stop, now));
        }

        Ok(engine::group_departures(&fresh, stop, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SharedDepartureCache;
    use crate::domain::ProviderKind;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// Repository returning fixed departures and recording requests.
    struct FixedRepository {
        departures: Vec<Departure>,
        requests: Mutex<Vec<(String, usize)>>,
        fail: bool,
    }

    impl FixedRepository {
        fn new(departures: Vec<Departure>) -> Arc<Self> {
            Arc::new(Self {
                departures,
                requests: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                departures: Vec::new(),
                requests: Mutex::new(Vec::new()),
                fail: true,
            })
        }

        fn requests(&self) -> Vec<(String, usize)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DepartureRepository for FixedRepository {
        async fn get_departures(
            &self,
            station_id: &str,
            limit: usize,
        ) -> Result<Vec<Departure>, ProviderError> {
            self.requests
                .lock()
                .unwrap()
                .push((station_id.to_string(), limit));
            if self.fail {
                return Err(ProviderError::Unavailable {
                    provider: ProviderKind::Mvg,
                    status: Some(502),
                    message: String::new(),
                });
            }
            Ok(self.departures.clone())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    fn dep(line: &str, destination: &str, minutes: i64) -> Departure {
        Departure::scheduled(line, destination, "Bus", now() + Duration::minutes(minutes))
    }

    fn stop() -> StopConfiguration {
        StopConfiguration::new("de:09162:6", "Hauptbahnhof").with_direction("East", ["Ostbahnhof"])
    }

    #[tokio::test]
    async fn fetches_with_configured_limit() {
        let repo = FixedRepository::new(vec![dep("S2", "Ostbahnhof", 600)]);
        let service = DepartureGroupingService::new(repo.clone());

        let mut stop = stop();
        stop.max_departures_fetch = 80;
        let groups = service.get_grouped_departures(&stop).await.unwrap();

        assert_eq!(repo.requests(), vec![("de:09162:6".to_string(), 80)]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].direction_name, "East");
    }

    #[tokio::test]
    async fn fetch_errors_propagate() {
        let service = DepartureGroupingService::new(FixedRepository::failing());
        let err = service.get_grouped_departures(&stop()).await.unwrap_err();
        assert_eq!(err.status(), Some(502));
    }

    #[tokio::test]
    async fn uses_cache_without_fetching() {
        let repo = FixedRepository::new(Vec::new());
        let service = DepartureGroupingService::new(repo.clone());
        let cache = SharedDepartureCache::default();
        cache
            .set("de:09162:6", vec![dep("S2", "Ostbahnhof", 5), dep("100", "Hauptbahnhof", 7)])
            .await;

        let groups = service
            .grouped_from_cache_at(&cache, &stop(), now())
            .await
            .unwrap();

        assert!(repo.requests().is_empty());
        let names: Vec<&str> = groups.iter().map(|g| g.direction_name.as_str()).collect();
        assert_eq!(names, vec!["East", "Other"]);
    }

    #[tokio::test]
    async fn stale_cache_triggers_fetch() {
        let repo = FixedRepository::new(vec![dep("S2", "Ostbahnhof", 3)]);
        let service = DepartureGroupingService::new(repo.clone());
        let cache = SharedDepartureCache::default();
        cache
            .set("de:09162:6", vec![dep("S2", "Ostbahnhof", -61)])
            .await;

        let groups = service
            .grouped_from_cache_at(&cache, &stop(), now())
            .await
            .unwrap();

        assert_eq!(repo.requests().len(), 1);
        assert_eq!(groups[0].departures[0].time, now() + Duration::minutes(3));
    }

    #[tokio::test]
    async fn old_entries_dropped_from_mixed_snapshot() {
        let repo = FixedRepository::new(Vec::new());
        let service = DepartureGroupingService::new(repo.clone());
        let cache = SharedDepartureCache::default();
        cache
            .set(
                "de:09162:6",
                vec![dep("S2", "Ostbahnhof", -90), dep("S2", "Ostbahnhof", -30)],
            )
            .await;

        let groups = service
            .grouped_from_cache_at(&cache, &stop(), now())
            .await
            .unwrap();

        assert!(repo.requests().is_empty());
        assert_eq!(groups[0].departures.len(), 1);
        assert_eq!(groups[0].departures[0].time, now() - Duration::minutes(30));
    }
}
