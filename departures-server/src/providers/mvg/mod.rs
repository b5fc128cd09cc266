//! MVG (Münchner Verkehrsgesellschaft) departures API.
//!
//! Key characteristics:
//! - Station ids are global ids (`de:09162:6`); departures carry the stop
//!   point id of the platform they leave from
//! - Timestamps are epoch milliseconds
//! - No lookup-by-id endpoint; stations are found via the location search

mod client;
mod convert;
mod types;

pub use client::{DEFAULT_BASE_URL, MvgClient};
pub use convert::{ConversionError, convert_departure, transport_type_display};
pub use types::{MvgDeparture, MvgLocation, MvgNearbyStation};
