//! Per-provider outbound rate limiting.
//!
//! Each upstream provider gets exactly one [`RateLimiter`] for the lifetime of
//! the [`RateLimiterRegistry`] that created it. Acquisitions for one provider
//! are serialized; different providers never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::ProviderKind;

/// Minimum delay between calls to each provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub mvg: Duration,
    pub db: Duration,
    pub vbb: Duration,
    pub hafas: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            mvg: Duration::from_millis(1000),
            db: Duration::from_millis(1500),
            vbb: Duration::from_millis(1000),
            hafas: Duration::from_millis(1000),
        }
    }
}

impl RateLimitConfig {
    /// Minimum delay configured for `kind`.
    pub fn delay_for(&self, kind: ProviderKind) -> Duration {
        match kind {
            ProviderKind::Mvg => self.mvg,
            ProviderKind::Db => self.db,
            ProviderKind::Vbb => self.vbb,
            ProviderKind::Hafas => self.hafas,
        }
    }

    /// Override the delay for one provider.
    pub fn with_delay(mut self, kind: ProviderKind, delay: Duration) -> Self {
        match kind {
            ProviderKind::Mvg => self.mvg = delay,
            ProviderKind::Db => self.db = delay,
            ProviderKind::Vbb => self.vbb = delay,
            ProviderKind::Hafas => self.hafas = delay,
        }
        self
    }
}

/// Enforces a minimum delay between successive calls to one provider.
#[derive(Debug)]
pub struct RateLimiter {
    provider: ProviderKind,
    min_delay: Duration,
    /// Held across the sleep so that the elapsed check, the wait and the
    /// update happen atomically with respect to other acquirers.
    last_acquired: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(provider: ProviderKind, min_delay: Duration) -> Self {
        Self {
            provider,
            min_delay,
            last_acquired: Mutex::new(None),
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Wait until `min_delay` has passed since the previous acquisition, then
    /// record this one.
    pub async fn acquire(&self) {
        let mut last = self.last_acquired.lock().await;

        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_delay {
                let wait = self.min_delay - elapsed;
                debug!(provider = %self.provider, wait_ms = wait.as_millis() as u64, "rate limiting");
                tokio::time::sleep(wait).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Owns one [`RateLimiter`] per provider.
///
/// The registry lock only guards creation. Acquisition goes through the
/// returned limiter, so a slow provider never blocks lookups for another.
#[derive(Debug, Default)]
pub struct RateLimiterRegistry {
    config: RateLimitConfig,
    limiters: RwLock<HashMap<ProviderKind, Arc<RateLimiter>>>,
}

impl RateLimiterRegistry {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            limiters: RwLock::new(HashMap::new()),
        }
    }

    /// Get the limiter for `kind`, creating it on first use.
    ///
    /// Concurrent first calls for the same provider return the same instance.
    pub fn limiter(&self, kind: ProviderKind) -> Arc<RateLimiter> {
        if let Some(limiter) = self
            .limiters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
        {
            return Arc::clone(limiter);
        }

        let mut limiters = self.limiters.write().unwrap_or_else(|e| e.into_inner());
        // Another caller may have created it between the two locks.
        Arc::clone(limiters.entry(kind).or_insert_with(|| {
            debug!(provider = %kind, "creating rate limiter");
            Arc::new(RateLimiter::new(kind, self.config.delay_for(kind)))
        }))
    }

    /// Acquire a call slot for `kind`.
    pub async fn acquire(&self, kind: ProviderKind) {
        self.limiter(kind).acquire().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(delay_ms: u64) -> RateLimiterRegistry {
        let delay = Duration::from_millis(delay_ms);
        let config = ProviderKind::ALL
            .into_iter()
            .fold(RateLimitConfig::default(), |c, k| c.with_delay(k, delay));
        RateLimiterRegistry::new(config)
    }

    #[test]
    fn default_delays() {
        let config = RateLimitConfig::default();
        assert_eq!(config.delay_for(ProviderKind::Mvg), Duration::from_secs(1));
        assert_eq!(config.delay_for(ProviderKind::Db), Duration::from_millis(1500));
    }

    #[test]
    fn same_provider_same_instance() {
        let registry = registry(100);
        let a = registry.limiter(ProviderKind::Mvg);
        let b = registry.limiter(ProviderKind::Mvg);
        let c = registry.limiter(ProviderKind::Db);

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn concurrent_creation_is_idempotent() {
        let registry = Arc::new(registry(100));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.limiter(ProviderKind::Vbb))
            })
            .collect();

        let limiters: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for l in &limiters[1..] {
            assert!(Arc::ptr_eq(&limiters[0], l));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_acquisitions_are_spaced() {
        let registry = registry(500);
        let start = Instant::now();

        for _ in 0..4 {
            registry.acquire(ProviderKind::Mvg).await;
        }

        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_acquisitions_serialize() {
        let registry = Arc::new(registry(1000));
        let start = Instant::now();

        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.acquire(ProviderKind::Db).await })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn providers_do_not_wait_on_each_other() {
        let registry = registry(1000);
        let start = Instant::now();

        registry.acquire(ProviderKind::Mvg).await;
        registry.acquire(ProviderKind::Db).await;
        registry.acquire(ProviderKind::Vbb).await;

        assert!(start.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn first_acquisition_is_immediate() {
        let limiter = RateLimiter::new(ProviderKind::Hafas, Duration::from_secs(5));
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
