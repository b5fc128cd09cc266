//! Background refresh of the shared departure cache.
//!
//! The poller fetches every distinct configured station through the
//! repository and stores the result in the cache. Stations whose routes have
//! had no viewers for longer than the idle grace period are skipped. A
//! failing station keeps its previous cache entry and never affects the
//! others.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::DepartureCache;
use crate::domain::{DEFAULT_MAX_DEPARTURES_FETCH, RouteConfiguration, base_station_id};
use crate::presence::PresenceTracker;
use crate::providers::ProviderError;
use crate::repository::DepartureRepository;

/// Poller timing and fetch settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// Refresh interval for routes without their own.
    pub refresh_interval: Duration,
    /// Sleep between cycles while no station is being watched.
    pub idle_interval: Duration,
    /// How long a route keeps being refreshed after its last viewer left.
    pub idle_grace: Duration,
    /// Bound on a single upstream call.
    pub fetch_timeout: Duration,
    /// Upper bound on departures requested per station.
    pub fetch_limit: usize,
    /// Stations fetched at the same time.
    pub max_concurrent_fetches: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            idle_interval: Duration::from_secs(300),
            idle_grace: Duration::from_secs(120),
            fetch_timeout: Duration::from_secs(10),
            fetch_limit: DEFAULT_MAX_DEPARTURES_FETCH,
            max_concurrent_fetches: 4,
        }
    }
}

impl PollerConfig {
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_idle(mut self, interval: Duration, grace: Duration) -> Self {
        self.idle_interval = interval;
        self.idle_grace = grace;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Per-call timeout, never longer than the refresh interval.
    pub fn effective_fetch_timeout(&self) -> Duration {
        self.fetch_timeout.min(self.refresh_interval)
    }
}

/// Lifecycle of an [`ApiPoller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Error from poller lifecycle calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollerError {
    #[error("poller already started (state: {0:?})")]
    AlreadyStarted(PollerState),
}

/// Outcome of the last fetch for a station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Ok,
    Error {
        reason: String,
        status: Option<u16>,
    },
}

/// Refresh bookkeeping for one station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationStatus {
    pub status: FetchStatus,
    pub last_attempt: DateTime<Utc>,
    /// When the cache entry was last replaced.
    pub last_success: Option<DateTime<Utc>>,
}

/// Aggregate health of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    /// No fetch failed.
    Success,
    /// Some fetches failed, some succeeded.
    Degraded,
    /// Every attempted fetch failed.
    Error,
}

impl ApiStatus {
    fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => ApiStatus::Success,
            (0, _) => ApiStatus::Error,
            _ => ApiStatus::Degraded,
        }
    }
}

/// Summary of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub refreshed: usize,
    pub failed: usize,
    /// Stations skipped because nobody is watching them.
    pub skipped: usize,
    pub status: ApiStatus,
    /// When the next station is due.
    pub next_wake: Instant,
}

/// One distinct upstream board and how it is refreshed.
#[derive(Debug, Clone, PartialEq)]
struct StationSchedule {
    /// Id passed to the repository: the first configured id for the board.
    station_id: String,
    /// Configured ids served by this board. A stop point and its base
    /// station share one fetch and each gets its own cache entry.
    cache_keys: Vec<String>,
    /// Paths of the routes showing this station.
    routes: Vec<String>,
    interval: Duration,
    limit: usize,
}

/// Collapse the configured routes into one schedule entry per base station.
///
/// A station on several routes uses the shortest of their intervals and the
/// largest fetch size of its stops.
fn build_schedule(routes: &[RouteConfiguration], config: &PollerConfig) -> Vec<StationSchedule> {
    let mut stations: BTreeMap<&str, StationSchedule> = BTreeMap::new();

    for route in routes {
        let interval = route.refresh_interval.unwrap_or(config.refresh_interval);
        for stop in &route.stops {
            let limit = stop.max_departures_fetch.min(config.fetch_limit);
            let entry = stations
                .entry(base_station_id(&stop.station_id))
                .or_insert_with(|| StationSchedule {
                    station_id: stop.station_id.clone(),
                    cache_keys: Vec::new(),
                    routes: Vec::new(),
                    interval,
                    limit,
                });
            if !entry.cache_keys.contains(&stop.station_id) {
                entry.cache_keys.push(stop.station_id.clone());
            }
            if !entry.routes.contains(&route.path) {
                entry.routes.push(route.path.clone());
            }
            entry.interval = entry.interval.min(interval);
            entry.limit = entry.limit.max(limit);
        }
    }

    stations.into_values().collect()
}

/// Timing state carried between cycles.
#[derive(Debug, Default)]
struct Timing {
    next_due: HashMap<String, Instant>,
    /// Last time each route had a viewer. Routes start out as just viewed.
    last_viewed: HashMap<String, Instant>,
}

struct PollerInner {
    config: PollerConfig,
    stations: Vec<Arc<StationSchedule>>,
    repository: Arc<dyn DepartureRepository>,
    cache: Arc<dyn DepartureCache>,
    presence: Arc<dyn PresenceTracker>,
    statuses: RwLock<HashMap<String, StationStatus>>,
    timing: tokio::sync::Mutex<Timing>,
}

impl PollerInner {
    /// Whether any of the station's routes is watched or still within grace.
    fn is_watched(&self, station: &StationSchedule, timing: &mut Timing, now: Instant) -> bool {
        let mut watched = false;
        for route in &station.routes {
            let last = timing.last_viewed.entry(route.clone()).or_insert(now);
            if self.presence.viewer_count(route) > 0 {
                *last = now;
                watched = true;
            } else if now.saturating_duration_since(*last) <= self.config.idle_grace {
                watched = true;
            }
        }
        watched
    }

    async fn run_cycle(&self, token: &CancellationToken) -> CycleReport {
        let mut timing = self.timing.lock().await;
        let now = Instant::now();

        let mut watched = Vec::new();
        let mut due = Vec::new();
        let mut skipped = 0;
        for station in &self.stations {
            if !self.is_watched(station, &mut timing, now) {
                debug!(station = %station.station_id, "no viewers, skipping station");
                skipped += 1;
                continue;
            }
            watched.push(station);
            let next = timing.next_due.get(&station.station_id).copied();
            if next.is_none_or(|t| t <= now) {
                due.push(Arc::clone(station));
            }
        }

        let results: Vec<(Arc<StationSchedule>, Option<Result<usize, ProviderError>>)> =
            futures::stream::iter(due)
                .map(|station| async move {
                    // Checked before each fetch so that stopping does not
                    // start new upstream calls.
                    if token.is_cancelled() {
                        return (station, None);
                    }
                    let result = self.refresh_station(&station).await;
                    (station, Some(result))
                })
                .buffer_unordered(self.config.max_concurrent_fetches.max(1))
                .collect()
                .await;

        let mut refreshed = 0;
        let mut failed = 0;
        let finished = Instant::now();
        for (station, result) in results {
            match result {
                Some(Ok(_)) => refreshed += 1,
                Some(Err(_)) => failed += 1,
                None => continue,
            }
            timing
                .next_due
                .insert(station.station_id.clone(), finished + station.interval);
        }

        // Only watched stations decide the wake-up; unwatched ones are
        // looked at again whenever the poller wakes.
        let next_wake = watched
            .iter()
            .filter_map(|s| timing.next_due.get(&s.station_id))
            .min()
            .map_or(finished + self.config.idle_interval, |t| (*t).max(finished));

        let report = CycleReport {
            refreshed,
            failed,
            skipped,
            status: ApiStatus::from_counts(refreshed, failed),
            next_wake,
        };
        debug!(
            refreshed,
            failed,
            skipped,
            status = ?report.status,
            "poll cycle finished"
        );
        report
    }

    /// Fetch one station and update the cache and its status.
    async fn refresh_station(&self, station: &StationSchedule) -> Result<usize, ProviderError> {
        let attempt = Utc::now();
        let result = self
            .repository
            .get_departures(&station.station_id, station.limit)
            .await;

        match result {
            Ok(departures) => {
                let count = departures.len();
                for key in &station.cache_keys {
                    self.cache.set(key, departures.clone()).await;
                    self.record(key, FetchStatus::Ok, attempt, true);
                }
                debug!(station = %station.station_id, count, "refreshed station");
                Ok(count)
            }
            Err(e) => {
                error!(
                    station = %station.station_id,
                    reason = %e.reason(),
                    status = ?e.status(),
                    error = %e,
                    "failed to refresh station, keeping cached departures"
                );
                if e.is_rate_limited() {
                    warn!(
                        station = %station.station_id,
                        provider = %e.provider(),
                        "rate limit (429) hit, consider raising the provider's minimum delay"
                    );
                }
                let status = FetchStatus::Error {
                    reason: e.reason(),
                    status: e.status(),
                };
                for key in &station.cache_keys {
                    self.record(key, status.clone(), attempt, false);
                }
                Err(e)
            }
        }
    }

    fn record(&self, station_id: &str, status: FetchStatus, attempt: DateTime<Utc>, success: bool) {
        let mut statuses = self.statuses.write().unwrap_or_else(|e| e.into_inner());
        let last_success = statuses.get(station_id).and_then(|s| s.last_success);
        statuses.insert(
            station_id.to_string(),
            StationStatus {
                status,
                last_attempt: attempt,
                last_success: if success { Some(attempt) } else { last_success },
            },
        );
    }

    async fn run(self: Arc<Self>, token: CancellationToken) {
        loop {
            let report = self.run_cycle(&token).await;
            if token.is_cancelled() {
                break;
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep_until(report.next_wake) => {}
            }
        }
    }
}

/// Scheduled refresher of the shared cache.
pub struct ApiPoller {
    inner: Arc<PollerInner>,
    state: Mutex<PollerState>,
    token: CancellationToken,
    /// Cancelled once the loop has exited and the state is `Stopped`.
    stopped: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ApiPoller {
    pub fn new(
        config: PollerConfig,
        routes: &[RouteConfiguration],
        repository: Arc<dyn DepartureRepository>,
        cache: Arc<dyn DepartureCache>,
        presence: Arc<dyn PresenceTracker>,
    ) -> Self {
        let stations = build_schedule(routes, &config)
            .into_iter()
            .map(Arc::new)
            .collect();
        Self {
            inner: Arc::new(PollerInner {
                config,
                stations,
                repository,
                cache,
                presence,
                statuses: RwLock::new(HashMap::new()),
                timing: tokio::sync::Mutex::new(Timing::default()),
            }),
            state: Mutex::new(PollerState::Idle),
            token: CancellationToken::new(),
            stopped: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PollerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Configured station ids whose cache entries this poller maintains.
    pub fn station_ids(&self) -> Vec<&str> {
        self.inner
            .stations
            .iter()
            .flat_map(|s| s.cache_keys.iter().map(String::as_str))
            .collect()
    }

    /// Spawn the refresh loop. Must be called within a Tokio runtime.
    ///
    /// Only an idle poller can be started; a stopped poller stays stopped.
    pub fn start(&self) -> Result<(), PollerError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != PollerState::Idle {
            return Err(PollerError::AlreadyStarted(*state));
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(inner.run(self.token.clone()));
        *self.handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        *state = PollerState::Running;

        info!(stations = self.inner.stations.len(), "poller started");
        Ok(())
    }

    /// Stop the refresh loop and wait for it to exit.
    ///
    /// In-flight fetches finish (or time out); no new fetch is started. A
    /// call made while another one is stopping waits for it to complete.
    /// Does nothing on a poller that was never started.
    pub async fn stop(&self) {
        let already_stopping = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match *state {
                PollerState::Running => {
                    *state = PollerState::Stopping;
                    false
                }
                PollerState::Stopping => true,
                PollerState::Idle | PollerState::Stopped => return,
            }
        };
        if already_stopping {
            self.stopped.cancelled().await;
            return;
        }

        self.token.cancel();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "poller task failed");
            }
        }

        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = PollerState::Stopped;
        self.stopped.cancel();
        info!("poller stopped");
    }

    /// Run a single refresh cycle now, without the loop.
    pub async fn run_cycle(&self) -> CycleReport {
        self.inner.run_cycle(&self.token).await
    }

    /// Refresh status of one station, if it was ever attempted.
    pub fn station_status(&self, station_id: &str) -> Option<StationStatus> {
        self.inner
            .statuses
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(station_id)
            .cloned()
    }

    /// Refresh status of every attempted station.
    pub fn statuses(&self) -> HashMap<String, StationStatus> {
        self.inner
            .statuses
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
