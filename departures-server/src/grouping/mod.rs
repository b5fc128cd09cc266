//! Direction grouping.
//!
//! Turns a station's flat departure list into the ordered, capped direction
//! groups one stop displays. The engine is a pure function of the departures,
//! the stop configuration and the current time; the service wraps it with
//! fetching from the repository or the shared cache.

mod engine;
mod matcher;
mod service;


pub use engine::{group_departures, platform_matches};
pub use matcher::{MatchKeys, normalize};
pub use service::DepartureGroupingService;
