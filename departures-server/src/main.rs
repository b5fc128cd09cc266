use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use departures_server::cache::{CacheConfig, DepartureCache, SharedDepartureCache};
use departures_server::config::{AppConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use departures_server::domain::RouteConfiguration;
use departures_server::grouping::DepartureGroupingService;
use departures_server::poller::ApiPoller;
use departures_server::presence::AlwaysPresent;
use departures_server::rate_limit::RateLimiterRegistry;
use departures_server::repository::{CompositeRepository, HttpAdapterFactory};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = match AppConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    if config.routes.is_empty() {
        warn!(path = %path, "no routes configured; nothing to poll");
    }

    let limiters = Arc::new(RateLimiterRegistry::new(config.rate_limits.clone()));
    let factory = Arc::new(HttpAdapterFactory::new(config.providers.clone()));
    let stops: Vec<_> = config.stop_configs().cloned().collect();
    let repository = Arc::new(
        CompositeRepository::new(&stops, factory, limiters)
            .with_default_provider(config.default_provider)
            .with_call_timeout(config.poller.effective_fetch_timeout()),
    );

    let cache = Arc::new(SharedDepartureCache::new(&CacheConfig::default()));
    let grouping = DepartureGroupingService::new(repository.clone());

    let poller = ApiPoller::new(
        config.poller.clone(),
        &config.routes,
        repository,
        cache.clone(),
        Arc::new(AlwaysPresent),
    );
    info!(stations = poller.station_ids().len(), "polling stations");

    // Without a web layer the grouped boards are written to the log
    let board_task = tokio::spawn(log_boards(
        config.routes.clone(),
        grouping,
        cache,
        config.poller.refresh_interval,
    ));

    if let Err(e) = poller.start() {
        error!(error = %e, "failed to start poller");
        std::process::exit(1);
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutting down"),
        Err(e) => error!(error = %e, "cannot listen for shutdown signal"),
    }

    board_task.abort();
    poller.stop().await;
    info!(state = ?poller.state(), "poller stopped");
}

/// Periodically group every configured stop from the cache and log the result.
async fn log_boards(
    routes: Vec<RouteConfiguration>,
    grouping: DepartureGroupingService,
    cache: Arc<SharedDepartureCache>,
    every: Duration,
) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await; // First tick is immediate, give the poller a cycle first
    loop {
        interval.tick().await;
        for route in &routes {
            for stop in &route.stops {
                let groups = match grouping
                    .grouped_from_cache(cache.as_ref() as &dyn DepartureCache, stop)
                    .await
                {
                    Ok(groups) => groups,
                    Err(e) => {
                        warn!(route = %route.path, station = %stop.station_id, error = %e, "no board");
                        continue;
                    }
                };
                for group in groups {
                    let next = group.departures.first().map(|d| {
                        format!("{} {} at {}", d.line, d.destination, d.time.format("%H:%M"))
                    });
                    info!(
                        route = %route.path,
                        stop = %stop.station_name,
                        direction = %group.direction_name,
                        count = group.departures.len(),
                        next = next.as_deref().unwrap_or("-"),
                        "board"
                    );
                }
            }
        }
    }
}
