//! Shared departure snapshot cache.
//!
//! Holds the latest departure list fetched for each station. Entries are
//! `Arc<Vec<Departure>>` and are only ever replaced whole, so a reader holds
//! either the old or the new snapshot and never a half-written one. There is
//! no expiry; staleness is the poller's concern.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::domain::Departure;

/// A station's cached departures.
pub type Snapshot = Arc<Vec<Departure>>;

/// Store of the most recent departures per station.
#[async_trait]
pub trait DepartureCache: Send + Sync {
    /// Departures last stored for `station_id`; empty if none.
    async fn get(&self, station_id: &str) -> Snapshot;

    /// Replace the departures stored for `station_id`.
    async fn set(&self, station_id: &str, departures: Vec<Departure>);

    /// Stations with a stored entry.
    async fn station_ids(&self) -> HashSet<String>;
}

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of stations kept.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

/// In-memory [`DepartureCache`] shared by the poller and the grouping service.
#[derive(Clone)]
pub struct SharedDepartureCache {
    snapshots: MokaCache<String, Snapshot>,
}

impl SharedDepartureCache {
    /// Create a new cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let snapshots = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .build();

        Self { snapshots }
    }

    /// Number of cached stations (for monitoring).
    pub fn entry_count(&self) -> u64 {
        self.snapshots.entry_count()
    }
}

impl Default for SharedDepartureCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

#[async_trait]
impl DepartureCache for SharedDepartureCache {
    async fn get(&self, station_id: &str) -> Snapshot {
        self.snapshots.get(station_id).await.unwrap_or_default()
    }

    async fn set(&self, station_id: &str, departures: Vec<Departure>) {
        self.snapshots
            .insert(station_id.to_string(), Arc::new(departures))
            .await;
    }

    async fn station_ids(&self) -> HashSet<String> {
        self.snapshots
            .iter()
            .map(|(station_id, _)| station_id.as_ref().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn departures(lines: &[&str]) -> Vec<Departure> {
        let t = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                Departure::scheduled(*line, "Somewhere", "Bus", t + chrono::Duration::minutes(i as i64))
            })
            .collect()
    }

    #[tokio::test]
    async fn unknown_station_is_empty() {
        let cache = SharedDepartureCache::default();
        assert!(cache.get("de:09162:6").await.is_empty());
        assert!(cache.station_ids().await.is_empty());
    }

    #[tokio::test]
    async fn set_then_get_returns_same_list() {
        let cache = SharedDepartureCache::default();
        let deps = departures(&["U2", "S8", "100", "U2"]);

        cache.set("de:09162:6", deps.clone()).await;

        assert_eq!(*cache.get("de:09162:6").await, deps);
    }

    #[tokio::test]
    async fn set_replaces_whole_entry() {
        let cache = SharedDepartureCache::default();
        cache.set("a", departures(&["U2", "U3"])).await;

        let before = cache.get("a").await;
        cache.set("a", departures(&["S1"])).await;

        // An earlier reader keeps its snapshot.
        assert_eq!(before.len(), 2);
        assert_eq!(*cache.get("a").await, departures(&["S1"]));

        cache.set("a", Vec::new()).await;
        assert!(cache.get("a").await.is_empty());
    }

    #[tokio::test]
    async fn lists_station_ids() {
        let cache = SharedDepartureCache::default();
        cache.set("a", departures(&["U2"])).await;
        cache.set("b", Vec::new()).await;
        cache.set("a", departures(&["U3"])).await;

        let ids = cache.station_ids().await;
        assert_eq!(ids, HashSet::from(["a".to_string(), "b".to_string()]));
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let cache = SharedDepartureCache::default();
        let other = cache.clone();

        cache.set("a", departures(&["U2"])).await;
        assert_eq!(other.get("a").await.len(), 1);
    }
}
