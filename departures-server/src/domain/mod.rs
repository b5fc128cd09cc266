//! Domain types for the departures aggregator.
//!
//! These are the provider-independent values that flow between the adapters,
//! the cache, the poller and the grouping engine. Provider-specific wire
//! shapes never leave their adapter module.

mod departure;
mod provider;
mod station;
mod stop;

pub use departure::Departure;
pub use provider::{
    HafasProfile, HafasProfileName, ProviderKind, UnknownHafasProfile, UnknownProvider,
};
pub use station::{Station, base_station_id, is_stop_point_id};
pub use stop::{
    DEFAULT_FETCH_WINDOW_MINUTES, DEFAULT_MAX_DEPARTURES_FETCH, DEFAULT_MAX_DEPARTURES_PER_ROUTE,
    DEFAULT_MAX_DEPARTURES_PER_STOP, DEFAULT_UNGROUPED_TITLE, GroupedDepartures,
    RouteConfiguration, StopConfiguration,
};
