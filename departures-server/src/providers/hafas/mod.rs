//! HAFAS `mgate` JSON protocol (`hafas` provider).
//!
//! Key characteristics of HAFAS:
//! - One POST endpoint per region; every request is wrapped in a client
//!   block and, depending on the profile, signed with an MD5 checksum
//! - Station board times are local `HHMMSS` strings relative to the
//!   journey's operating day
//! - Lines, remarks and locations are referenced by index into shared lists
//!
//! Stations configured with the `auto` profile are tried against each known
//! profile on first use; the result is remembered per station.

mod client;
mod convert;
mod profile;
mod request;
mod types;

pub use client::HafasClient;
pub use convert::{ConversionError, parse_board_time};
pub use profile::{ChecksumMode, Product, ProfileConstants, constants};
