//! Viewer presence, used by the poller to skip routes nobody is watching.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

/// Source of live viewer counts per route path.
pub trait PresenceTracker: Send + Sync {
    /// Number of viewers currently connected to the route at `route_path`.
    fn viewer_count(&self, route_path: &str) -> usize;
}

/// Tracker that reports one viewer everywhere, for running without a web layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPresent;

impl PresenceTracker for AlwaysPresent {
    fn viewer_count(&self, _route_path: &str) -> usize {
        1
    }
}

/// In-process viewer counters maintained by the web layer.
///
/// Paths are normalized so that `/work/`, `work` and `/work` count together.
#[derive(Debug, Default)]
pub struct ViewerCounts {
    counts: RwLock<HashMap<String, usize>>,
}

fn normalize(route_path: &str) -> String {
    let trimmed = route_path.trim_matches('/');
    format!("/{trimmed}")
}

impl ViewerCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new viewer. Returns the route's count afterwards.
    pub fn connect(&self, route_path: &str) -> usize {
        let path = normalize(route_path);
        let mut counts = self.counts.write().unwrap_or_else(|e| e.into_inner());
        let count = counts.entry(path.clone()).or_insert(0);
        *count += 1;
        debug!(route = %path, viewers = *count, "viewer connected");
        *count
    }

    /// Record a viewer leaving. Returns the route's count afterwards.
    pub fn disconnect(&self, route_path: &str) -> usize {
        let path = normalize(route_path);
        let mut counts = self.counts.write().unwrap_or_else(|e| e.into_inner());
        let remaining = match counts.get_mut(&path) {
            Some(count) if *count > 1 => {
                *count -= 1;
                *count
            }
            Some(_) => {
                counts.remove(&path);
                0
            }
            None => 0,
        };
        debug!(route = %path, viewers = remaining, "viewer disconnected");
        remaining
    }

    /// Viewers across all routes.
    pub fn total(&self) -> usize {
        self.counts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .sum()
    }
}

impl PresenceTracker for ViewerCounts {
    fn viewer_count(&self, route_path: &str) -> usize {
        self.counts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&normalize(route_path))
            .copied()
            .unwrap_or(0)
    }
}
