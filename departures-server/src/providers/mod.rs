//! Upstream departure providers.
//!
//! Each provider module owns its wire DTOs (`types.rs`), the mapping into
//! canonical [`Departure`]s (`convert.rs`) and an HTTP client implementing
//! [`ProviderAdapter`]. Supported upstreams:
//! - [`mvg`]: the MVG departures API (primary provider)
//! - [`transport_rest`]: `v6.db.transport.rest` and `v6.bvg.transport.rest`
//! - [`hafas`]: HAFAS `mgate` endpoints with per-region profiles
//!
//! Adapters never filter by grouping rules and never swallow errors.

mod error;
pub mod hafas;
mod http;
pub mod mvg;
pub mod transport_rest;

use async_trait::async_trait;

use crate::domain::{Departure, HafasProfileName, ProviderKind, Station};

pub use error::ProviderError;
pub use http::ProviderConfig;

/// A departures request for one station.
#[derive(Debug, Clone, PartialEq)]
pub struct DepartureQuery {
    /// Provider-scoped station id (never a stop point id).
    pub station_id: String,
    /// Maximum number of departures returned.
    pub limit: usize,
    /// Look-ahead window in minutes.
    pub window_minutes: u32,
    /// Only return these transport types (case-insensitive). `None` means all.
    pub transport_types: Option<Vec<String>>,
    /// HAFAS profile; ignored by the other providers.
    pub hafas_profile: HafasProfileName,
}

impl DepartureQuery {
    pub fn new(station_id: impl Into<String>, limit: usize) -> Self {
        Self {
            station_id: station_id.into(),
            limit,
            window_minutes: crate::domain::DEFAULT_FETCH_WINDOW_MINUTES,
            transport_types: None,
            hafas_profile: HafasProfileName::Auto,
        }
    }

    pub fn with_window(mut self, minutes: u32) -> Self {
        self.window_minutes = minutes;
        self
    }

    pub fn with_transport_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transport_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_hafas_profile(mut self, profile: HafasProfileName) -> Self {
        self.hafas_profile = profile;
        self
    }

    /// Number of raw records to request upstream.
    ///
    /// Twice the limit, so that transport filtering and later grouping still
    /// leave enough departures.
    pub fn overfetch_limit(&self) -> usize {
        self.limit.saturating_mul(2).max(1)
    }

    /// Apply the transport-type filter and the limit to canonical departures.
    pub fn finish(&self, mut departures: Vec<Departure>) -> Vec<Departure> {
        if let Some(types) = &self.transport_types {
            let wanted: Vec<String> = types.iter().map(|t| t.to_lowercase()).collect();
            departures.retain(|d| wanted.contains(&d.transport_type.to_lowercase()));
        }
        departures.truncate(self.limit);
        departures
    }
}

/// One upstream departure API.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which provider this adapter talks to.
    fn kind(&self) -> ProviderKind;

    /// Fetch canonical departures for a station, in upstream order.
    async fn fetch_departures(&self, query: &DepartureQuery)
    -> Result<Vec<Departure>, ProviderError>;

    /// Search stations by free text.
    async fn search_stations(&self, query: &str) -> Result<Vec<Station>, ProviderError>;

    /// Look up one station by id. `Ok(None)` if it does not exist.
    async fn get_station(&self, station_id: &str) -> Result<Option<Station>, ProviderError>;

    /// Nearest station to a coordinate, if the provider supports it.
    async fn find_nearby_station(
        &self,
        _latitude: f64,
        _longitude: f64,
    ) -> Result<Option<Station>, ProviderError> {
        Ok(None)
    }
}
