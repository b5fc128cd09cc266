//! Departure board aggregator.
//!
//! Polls public-transport providers (MVG, the transport.rest mirrors of DB
//! and VBB, and HAFAS endpoints) for the stations on configured display
//! routes, keeps the latest snapshot per station in a shared cache and groups
//! departures into direction buckets for display.

pub mod cache;
pub mod config;
pub mod domain;
pub mod grouping;
pub mod poller;
pub mod presence;
pub mod providers;
pub mod rate_limit;
pub mod repository;
