//! MVG HTTP client.

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{Departure, ProviderKind, Station};
use crate::providers::http::{ProviderConfig, build_client, read_json};
use crate::providers::{DepartureQuery, ProviderAdapter, ProviderError};

use super::convert::{convert_departures, convert_location, convert_nearby};
use super::types::{MvgDeparture, MvgLocation, MvgNearbyStation};

/// Default base URL for the MVG API.
pub const DEFAULT_BASE_URL: &str = "https://www.mvg.de";

/// Transport types requested from the departures endpoint.
const TRANSPORT_TYPES: &str = "UBAHN,TRAM,SBAHN,BUS,REGIONAL_BUS,BAHN";

const PROVIDER: ProviderKind = ProviderKind::Mvg;

/// MVG departures API client.
#[derive(Debug, Clone)]
pub struct MvgClient {
    http: reqwest::Client,
    base_url: String,
}

impl MvgClient {
    /// Create a new MVG client with the given configuration.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            http: build_client(PROVIDER, config)?,
            base_url: config.base_url.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::http(PROVIDER, e))?;

        read_json(PROVIDER, response).await
    }

    async fn raw_departures(
        &self,
        station_id: &str,
        limit: usize,
    ) -> Result<Vec<MvgDeparture>, ProviderError> {
        self.get_json(
            "/api/bgw-pt/v3/departures",
            &[
                ("globalId", station_id.to_string()),
                ("limit", limit.to_string()),
                ("transportTypes", TRANSPORT_TYPES.to_string()),
            ],
        )
        .await
    }
}

#[async_trait]
impl ProviderAdapter for MvgClient {
    fn kind(&self) -> ProviderKind {
        PROVIDER
    }

    async fn fetch_departures(
        &self,
        query: &DepartureQuery,
    ) -> Result<Vec<Departure>, ProviderError> {
        // The MVG endpoint has no duration parameter; the limit bounds the window.
        let raw = self
            .raw_departures(&query.station_id, query.overfetch_limit())
            .await?;
        debug!(station = %query.station_id, count = raw.len(), "MVG departures");

        Ok(query.finish(convert_departures(&raw)))
    }

    async fn search_stations(&self, query: &str) -> Result<Vec<Station>, ProviderError> {
        let raw: Vec<MvgLocation> = self
            .get_json(
                "/api/bgw-pt/v3/locations",
                &[
                    ("query", query.to_string()),
                    ("locationTypes", "STATION".to_string()),
                ],
            )
            .await?;

        Ok(raw.iter().filter_map(convert_location).collect())
    }

    async fn get_station(&self, station_id: &str) -> Result<Option<Station>, ProviderError> {
        // No lookup-by-id endpoint. Prefer an exact search hit, otherwise
        // confirm the id exists by probing its departures.
        let found = self
            .search_stations(station_id)
            .await?
            .into_iter()
            .find(|s| s.id == station_id);
        if found.is_some() {
            return Ok(found);
        }

        match self.raw_departures(station_id, 1).await {
            Ok(raw) if !raw.is_empty() => Ok(Some(Station::new(
                station_id,
                station_id,
                "München",
                0.0,
                0.0,
            ))),
            Ok(_) => Ok(None),
            // Unknown ids are answered with a client error.
            Err(ProviderError::Unavailable {
                status: Some(400..=404),
                ..
            }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_nearby_station(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<Station>, ProviderError> {
        let raw: Vec<MvgNearbyStation> = self
            .get_json(
                "/api/bgw-pt/v3/stations/nearby",
                &[
                    ("latitude", latitude.to_string()),
                    ("longitude", longitude.to_string()),
                ],
            )
            .await?;

        Ok(raw.first().map(convert_nearby))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_uses_configured_base_url() {
        let client = MvgClient::new(&ProviderConfig::new("http://localhost:9999/")).unwrap();
        assert_eq!(client.base_url, "http://localhost:9999");
        assert_eq!(client.kind(), ProviderKind::Mvg);
    }
}
