//! transport.rest v6 REST APIs (`db` and `vbb` providers).
//!
//! Key characteristics:
//! - ISO 8601 timestamps with offsets
//! - `delay` in seconds, `null` when there is no live data
//! - Line products (`suburban`, `regionalExpress`, ...) name the transport type

mod client;
mod convert;
mod types;

pub use client::{DB_BASE_URL, TransportRestClient, VBB_BASE_URL};
pub use convert::{ConversionError, convert_departure, transport_type_for};
pub use types::{DeparturesResponse, TrDeparture, TrLine, TrLocation, TrStop};
