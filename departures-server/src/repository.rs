//! Composite departure repository.
//!
//! Routes each station to the provider its stop configuration names, creates
//! one adapter per provider on first use, and funnels every outbound call
//! through that provider's rate limiter and a per-call timeout. Errors are
//! never swallowed here; containing them is the poller's job.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::{
    DEFAULT_FETCH_WINDOW_MINUTES, Departure, HafasProfileName, ProviderKind, Station,
    StopConfiguration, base_station_id,
};
use crate::providers::hafas::HafasClient;
use crate::providers::mvg::{self, MvgClient};
use crate::providers::transport_rest::{self, TransportRestClient};
use crate::providers::{DepartureQuery, ProviderAdapter, ProviderConfig, ProviderError};
use crate::rate_limit::RateLimiterRegistry;

/// Default bound on one upstream call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of departures for a station.
#[async_trait]
pub trait DepartureRepository: Send + Sync {
    /// Fetch up to `limit` canonical departures for a station or stop point.
    async fn get_departures(
        &self,
        station_id: &str,
        limit: usize,
    ) -> Result<Vec<Departure>, ProviderError>;
}

/// Creates provider adapters.
pub trait AdapterFactory: Send + Sync {
    fn create(&self, kind: ProviderKind) -> Result<Arc<dyn ProviderAdapter>, ProviderError>;
}

/// Connection settings for every provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub mvg: ProviderConfig,
    pub db: ProviderConfig,
    pub vbb: ProviderConfig,
    /// Empty base URL means each HAFAS profile's own endpoint.
    pub hafas: ProviderConfig,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            mvg: ProviderConfig::new(mvg::DEFAULT_BASE_URL),
            db: ProviderConfig::new(transport_rest::DB_BASE_URL),
            vbb: ProviderConfig::new(transport_rest::VBB_BASE_URL),
            hafas: ProviderConfig::new(""),
        }
    }
}

impl ProviderSettings {
    pub fn for_kind(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::Mvg => &self.mvg,
            ProviderKind::Db => &self.db,
            ProviderKind::Vbb => &self.vbb,
            ProviderKind::Hafas => &self.hafas,
        }
    }

    pub fn for_kind_mut(&mut self, kind: ProviderKind) -> &mut ProviderConfig {
        match kind {
            ProviderKind::Mvg => &mut self.mvg,
            ProviderKind::Db => &mut self.db,
            ProviderKind::Vbb => &mut self.vbb,
            ProviderKind::Hafas => &mut self.hafas,
        }
    }
}

/// Factory for the real HTTP adapters.
#[derive(Debug, Clone, Default)]
pub struct HttpAdapterFactory {
    settings: ProviderSettings,
}

impl HttpAdapterFactory {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

impl AdapterFactory for HttpAdapterFactory {
    fn create(&self, kind: ProviderKind) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        let config = self.settings.for_kind(kind);
        let adapter: Arc<dyn ProviderAdapter> = match kind {
            ProviderKind::Mvg => Arc::new(MvgClient::new(config)?),
            ProviderKind::Db => Arc::new(TransportRestClient::db(config)?),
            ProviderKind::Vbb => Arc::new(TransportRestClient::vbb(config)?),
            ProviderKind::Hafas => Arc::new(HafasClient::new(config)?),
        };
        Ok(adapter)
    }
}

/// How one configured station is fetched.
#[derive(Debug, Clone, PartialEq)]
struct StationRoute {
    provider: ProviderKind,
    hafas_profile: HafasProfileName,
    window_minutes: u32,
}

/// How to identify a station in [`CompositeRepository::find_station`].
#[derive(Debug, Clone, PartialEq)]
pub enum StationLookup {
    Id(String),
    Name { name: String, place: String },
    Coordinates { latitude: f64, longitude: f64 },
}

/// Departure repository that dispatches to the right provider per station.
pub struct CompositeRepository {
    routes: HashMap<String, StationRoute>,
    default_provider: ProviderKind,
    factory: Arc<dyn AdapterFactory>,
    adapters: RwLock<HashMap<ProviderKind, Arc<dyn ProviderAdapter>>>,
    limiters: Arc<RateLimiterRegistry>,
    call_timeout: Duration,
}

impl CompositeRepository {
    /// Create a repository routing the given stops.
    ///
    /// When several stops share a station id the first one decides the
    /// provider; stations not listed use the default provider.
    pub fn new(
        stops: &[StopConfiguration],
        factory: Arc<dyn AdapterFactory>,
        limiters: Arc<RateLimiterRegistry>,
    ) -> Self {
        let mut routes: HashMap<String, StationRoute> = HashMap::new();
        for stop in stops {
            let route = StationRoute {
                provider: stop.provider,
                hafas_profile: stop.hafas_profile,
                window_minutes: stop.fetch_max_minutes_in_advance,
            };
            match routes.get(&stop.station_id) {
                Some(existing) if existing.provider != route.provider => {
                    warn!(
                        station = %stop.station_id,
                        kept = %existing.provider,
                        ignored = %route.provider,
                        "station configured with conflicting providers"
                    );
                }
                Some(_) => {}
                None => {
                    routes.insert(stop.station_id.clone(), route);
                }
            }
        }

        Self {
            routes,
            default_provider: ProviderKind::default(),
            factory,
            adapters: RwLock::new(HashMap::new()),
            limiters,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Provider for stations without configuration.
    pub fn with_default_provider(mut self, provider: ProviderKind) -> Self {
        self.default_provider = provider;
        self
    }

    /// Bound on each upstream call.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Provider that serves `station_id`.
    pub fn provider_for(&self, station_id: &str) -> ProviderKind {
        self.route(station_id).provider
    }

    fn route(&self, station_id: &str) -> StationRoute {
        self.routes
            .get(station_id)
            .or_else(|| self.routes.get(base_station_id(station_id)))
            .cloned()
            .unwrap_or_else(|| {
                debug!(station = station_id, provider = %self.default_provider, "station not configured, using default provider");
                StationRoute {
                    provider: self.default_provider,
                    hafas_profile: HafasProfileName::Auto,
                    window_minutes: DEFAULT_FETCH_WINDOW_MINUTES,
                }
            })
    }

    /// Adapter for `kind`, created on first use.
    pub fn adapter(&self, kind: ProviderKind) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        if let Some(adapter) = self
            .adapters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
        {
            return Ok(Arc::clone(adapter));
        }

        let mut adapters = self.adapters.write().unwrap_or_else(|e| e.into_inner());
        if let Some(adapter) = adapters.get(&kind) {
            return Ok(Arc::clone(adapter));
        }

        info!(provider = %kind, "creating provider adapter");
        let adapter = self.factory.create(kind)?;
        adapters.insert(kind, Arc::clone(&adapter));
        Ok(adapter)
    }

    /// Run one upstream call under the provider's rate limit and the call timeout.
    async fn call<T, F>(&self, kind: ProviderKind, fut: F) -> Result<T, ProviderError>
    where
        F: std::future::Future<Output = Result<T, ProviderError>> + Send,
    {
        self.limiters.acquire(kind).await;

        tokio::time::timeout(self.call_timeout, fut)
            .await
            .map_err(|_| ProviderError::Timeout {
                provider: kind,
                after: self.call_timeout,
            })?
    }

    /// Search stations with a specific provider.
    pub async fn search_stations(
        &self,
        provider: ProviderKind,
        query: &str,
    ) -> Result<Vec<Station>, ProviderError> {
        let adapter = self.adapter(provider)?;
        self.call(provider, adapter.search_stations(query)).await
    }

    /// Find a single station. `Ok(None)` when nothing matches.
    ///
    /// Id lookups use the provider configured for that station; name and
    /// coordinate lookups use the default provider.
    pub async fn find_station(&self, lookup: &StationLookup) -> Result<Option<Station>, ProviderError> {
        match lookup {
            StationLookup::Id(id) => {
                let provider = self.provider_for(id);
                let adapter = self.adapter(provider)?;
                self.call(provider, adapter.get_station(base_station_id(id)))
                    .await
            }
            StationLookup::Name { name, place } => {
                let query = if place.is_empty() {
                    name.clone()
                } else {
                    format!("{name}, {place}")
                };
                let stations = self.search_stations(self.default_provider, &query).await?;
                Ok(stations.into_iter().next())
            }
            StationLookup::Coordinates {
                latitude,
                longitude,
            } => {
                let provider = self.default_provider;
                let adapter = self.adapter(provider)?;
                self.call(provider, adapter.find_nearby_station(*latitude, *longitude))
                    .await
            }
        }
    }

    pub async fn find_station_by_id(&self, station_id: &str) -> Result<Option<Station>, ProviderError> {
        self.find_station(&StationLookup::Id(station_id.to_string()))
            .await
    }

    pub async fn find_station_by_name(
        &self,
        name: &str,
        place: &str,
    ) -> Result<Option<Station>, ProviderError> {
        self.find_station(&StationLookup::Name {
            name: name.to_string(),
            place: place.to_string(),
        })
        .await
    }

    pub async fn find_nearby_station(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<Station>, ProviderError> {
        self.find_station(&StationLookup::Coordinates {
            latitude,
            longitude,
        })
        .await
    }
}

#[async_trait]
impl DepartureRepository for CompositeRepository {
    async fn get_departures(
        &self,
        station_id: &str,
        limit: usize,
    ) -> Result<Vec<Departure>, ProviderError> {
        let route = self.route(station_id);
        let adapter = self.adapter(route.provider)?;

        // Providers only know base stations; stop point filtering happens
        // when grouping.
        let query = DepartureQuery::new(base_station_id(station_id), limit)
            .with_window(route.window_minutes)
            .with_hafas_profile(route.hafas_profile);

        self.call(route.provider, adapter.fetch_departures(&query))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimitConfig;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Adapter that records queries and returns canned departures.
    struct MockAdapter {
        kind: ProviderKind,
        queries: Mutex<Vec<DepartureQuery>>,
        delay: Duration,
        fail_with: Option<u16>,
    }

    impl MockAdapter {
        fn new(kind: ProviderKind) -> Self {
            Self {
                kind,
                queries: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
                fail_with: None,
            }
        }
    }

    #[async_trait]
    impl ProviderAdapter for MockAdapter {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn fetch_departures(
            &self,
            query: &DepartureQuery,
        ) -> Result<Vec<Departure>, ProviderError> {
            self.queries.lock().unwrap().push(query.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(status) = self.fail_with {
                return Err(ProviderError::Unavailable {
                    provider: self.kind,
                    status: Some(status),
                    message: String::new(),
                });
            }
            let t = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
            Ok(vec![Departure::scheduled(
                self.kind.as_str(),
                &query.station_id,
                "Bus",
                t,
            )])
        }

        async fn search_stations(&self, query: &str) -> Result<Vec<Station>, ProviderError> {
            Ok(vec![Station::new("found", query, "", 1.0, 2.0)])
        }

        async fn get_station(&self, station_id: &str) -> Result<Option<Station>, ProviderError> {
            Ok((station_id != "missing").then(|| Station::new(station_id, "Stop", "", 0.0, 0.0)))
        }
    }

    /// Factory that hands out one prepared adapter per kind and counts calls.
    struct MockFactory {
        adapters: HashMap<ProviderKind, Arc<MockAdapter>>,
        created: Mutex<usize>,
    }

    impl MockFactory {
        fn new(adapters: Vec<MockAdapter>) -> Arc<Self> {
            Arc::new(Self {
                adapters: adapters
                    .into_iter()
                    .map(|a| (a.kind, Arc::new(a)))
                    .collect(),
                created: Mutex::new(0),
            })
        }

        fn created(&self) -> usize {
            *self.created.lock().unwrap()
        }

        fn queries(&self, kind: ProviderKind) -> Vec<DepartureQuery> {
            self.adapters[&kind].queries.lock().unwrap().clone()
        }
    }

    impl AdapterFactory for MockFactory {
        fn create(&self, kind: ProviderKind) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
            *self.created.lock().unwrap() += 1;
            match self.adapters.get(&kind) {
                Some(a) => Ok(Arc::clone(a) as Arc<dyn ProviderAdapter>),
                None => Err(ProviderError::data(kind, "no mock adapter")),
            }
        }
    }

    fn limiters(delay: Duration) -> Arc<RateLimiterRegistry> {
        let config = ProviderKind::ALL
            .into_iter()
            .fold(RateLimitConfig::default(), |c, k| c.with_delay(k, delay));
        Arc::new(RateLimiterRegistry::new(config))
    }

    fn stops() -> Vec<StopConfiguration> {
        let mut hafas = StopConfiguration::new("8000261", "München Hbf (HAFAS)")
            .with_provider(ProviderKind::Hafas);
        hafas.hafas_profile = HafasProfileName::Named(crate::domain::HafasProfile::Db);
        hafas.fetch_max_minutes_in_advance = 90;

        vec![
            StopConfiguration::new("de:09162:1108:1:1", "Giesing Gleis 1"),
            StopConfiguration::new("900100003", "Alexanderplatz").with_provider(ProviderKind::Vbb),
            hafas,
        ]
    }

    fn all_mocks() -> Arc<MockFactory> {
        MockFactory::new(ProviderKind::ALL.into_iter().map(MockAdapter::new).collect())
    }

    #[tokio::test]
    async fn routes_by_configured_provider() {
        let factory = all_mocks();
        let repo = CompositeRepository::new(&stops(), factory.clone(), limiters(Duration::ZERO));

        let deps = repo.get_departures("900100003", 10).await.unwrap();
        assert_eq!(deps[0].line, "vbb");

        let deps = repo.get_departures("8000261", 10).await.unwrap();
        assert_eq!(deps[0].line, "hafas");

        let q = &factory.queries(ProviderKind::Hafas)[0];
        assert_eq!(q.window_minutes, 90);
        assert_eq!(
            q.hafas_profile,
            HafasProfileName::Named(crate::domain::HafasProfile::Db)
        );
        assert_eq!(q.limit, 10);
    }

    #[tokio::test]
    async fn stop_point_fetched_via_base_station() {
        let factory = all_mocks();
        let repo = CompositeRepository::new(&stops(), factory.clone(), limiters(Duration::ZERO));

        repo.get_departures("de:09162:1108:1:1", 5).await.unwrap();

        let q = &factory.queries(ProviderKind::Mvg)[0];
        assert_eq!(q.station_id, "de:09162:1108");
    }

    #[tokio::test]
    async fn unknown_station_uses_default_provider() {
        let factory = all_mocks();
        let repo = CompositeRepository::new(&stops(), factory.clone(), limiters(Duration::ZERO))
            .with_default_provider(ProviderKind::Db);

        let deps = repo.get_departures("8000013", 5).await.unwrap();
        assert_eq!(deps[0].line, "db");
        assert_eq!(repo.provider_for("8000013"), ProviderKind::Db);
    }

    #[tokio::test]
    async fn one_adapter_per_provider() {
        let factory = all_mocks();
        let repo = Arc::new(CompositeRepository::new(
            &stops(),
            factory.clone(),
            limiters(Duration::ZERO),
        ));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move { repo.get_departures("900100003", 1).await })
            })
            .collect();
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        assert_eq!(factory.created(), 1);
        assert!(Arc::ptr_eq(
            &repo.adapter(ProviderKind::Vbb).unwrap(),
            &repo.adapter(ProviderKind::Vbb).unwrap()
        ));
        assert_eq!(factory.created(), 1);
    }

    #[tokio::test]
    async fn errors_propagate() {
        let mut failing = MockAdapter::new(ProviderKind::Mvg);
        failing.fail_with = Some(503);
        let factory = MockFactory::new(vec![failing]);
        let repo = CompositeRepository::new(&[], factory, limiters(Duration::ZERO));

        let err = repo.get_departures("de:09162:6", 5).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.provider(), ProviderKind::Mvg);
    }

    #[tokio::test]
    async fn factory_failure_is_not_memoized() {
        let factory = MockFactory::new(vec![]);
        let repo = CompositeRepository::new(&[], factory.clone(), limiters(Duration::ZERO));

        assert!(repo.get_departures("x", 1).await.is_err());
        assert!(repo.get_departures("x", 1).await.is_err());
        assert_eq!(factory.created(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn calls_are_rate_limited_per_provider() {
        let factory = all_mocks();
        let repo = CompositeRepository::new(&stops(), factory, limiters(Duration::from_secs(1)));
        let start = Instant::now();

        repo.get_departures("de:09162:6", 1).await.unwrap();
        repo.get_departures("de:09162:7", 1).await.unwrap();
        repo.get_departures("de:09162:8", 1).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));

        // A different provider does not wait on the MVG limiter.
        let before = Instant::now();
        repo.get_departures("900100003", 1).await.unwrap();
        assert!(before.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_time_out() {
        let mut slow = MockAdapter::new(ProviderKind::Mvg);
        slow.delay = Duration::from_secs(60);
        let factory = MockFactory::new(vec![slow]);
        let repo = CompositeRepository::new(&[], factory, limiters(Duration::ZERO))
            .with_call_timeout(Duration::from_secs(5));

        let err = repo.get_departures("de:09162:6", 1).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { provider: ProviderKind::Mvg, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn station_lookups() {
        let factory = all_mocks();
        let repo = CompositeRepository::new(&stops(), factory, limiters(Duration::ZERO));

        let found = repo
            .find_station(&StationLookup::Id("900100003".into()))
            .await
            .unwrap();
        assert_eq!(found.map(|s| s.id), Some("900100003".to_string()));

        let missing = repo
            .find_station(&StationLookup::Id("missing".into()))
            .await
            .unwrap();
        assert!(missing.is_none());

        let by_name = repo
            .find_station(&StationLookup::Name {
                name: "Marienplatz".into(),
                place: "München".into(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.name, "Marienplatz, München");

        // The mock has no nearby search.
        let nearby = repo
            .find_station(&StationLookup::Coordinates {
                latitude: 48.1,
                longitude: 11.5,
            })
            .await
            .unwrap();
        assert!(nearby.is_none());
    }

    #[tokio::test]
    async fn lookup_shorthands() {
        let repo = CompositeRepository::new(&stops(), all_mocks(), limiters(Duration::ZERO));

        let found = repo.find_station_by_id("900100003").await.unwrap();
        assert_eq!(found.map(|s| s.id), Some("900100003".to_string()));

        let by_name = repo.find_station_by_name("Marienplatz", "").await.unwrap().unwrap();
        assert_eq!(by_name.name, "Marienplatz");

        assert!(repo.find_nearby_station(48.1, 11.5).await.unwrap().is_none());
    }
}
