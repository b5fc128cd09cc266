//! transport.rest HTTP client.

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::domain::{Departure, ProviderKind, Station};
use crate::providers::http::{ProviderConfig, build_client, read_json};
use crate::providers::{DepartureQuery, ProviderAdapter, ProviderError};

use super::convert::{convert_departures, convert_stop};
use super::types::{DeparturesResponse, TrStop};

/// Base URL of the Deutsche Bahn instance.
pub const DB_BASE_URL: &str = "https://v6.db.transport.rest";

/// Base URL of the Berlin/Brandenburg instance.
pub const VBB_BASE_URL: &str = "https://v6.bvg.transport.rest";

/// Number of results requested from the location search.
const SEARCH_RESULTS: usize = 20;

/// Client for a transport.rest v6 deployment.
///
/// The same wire format serves two providers; `kind` decides which one this
/// instance reports as and which rate limiter the repository uses for it.
#[derive(Debug, Clone)]
pub struct TransportRestClient {
    kind: ProviderKind,
    http: reqwest::Client,
    base_url: String,
}

impl TransportRestClient {
    /// Create a client for `kind` with the given configuration.
    pub fn new(kind: ProviderKind, config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            kind,
            http: build_client(kind, config)?,
            base_url: config.base_url.clone(),
        })
    }

    /// Client for `v6.db.transport.rest`.
    pub fn db(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Self::new(ProviderKind::Db, config)
    }

    /// Client for `v6.bvg.transport.rest`.
    pub fn vbb(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Self::new(ProviderKind::Vbb, config)
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
            .map_err(|e| ProviderError::http(self.kind, e))?;

        read_json(self.kind, response).await
    }
}

#[async_trait]
impl ProviderAdapter for TransportRestClient {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn fetch_departures(
        &self,
        query: &DepartureQuery,
    ) -> Result<Vec<Departure>, ProviderError> {
        let path = format!("/stops/{}/departures", query.station_id);
        // `when` pinned to UTC so the window matches the timestamps returned.
        let response: DeparturesResponse = self
            .get_json(
                &path,
                &[
                    ("duration", query.window_minutes.to_string()),
                    ("results", query.overfetch_limit().to_string()),
                    ("when", Utc::now().to_rfc3339()),
                ],
            )
            .await?;

        let raw = response.into_departures();
        debug!(provider = %self.kind, station = %query.station_id, count = raw.len(), "transport.rest departures");

        Ok(query.finish(convert_departures(&raw)))
    }

    async fn search_stations(&self, query: &str) -> Result<Vec<Station>, ProviderError> {
        let raw: Vec<TrStop> = self
            .get_json(
                "/locations",
                &[
                    ("query", query.to_string()),
                    ("results", SEARCH_RESULTS.to_string()),
                ],
            )
            .await?;

        Ok(raw.iter().filter_map(convert_stop).collect())
    }

    async fn get_station(&self, station_id: &str) -> Result<Option<Station>, ProviderError> {
        let path = format!("/stops/{station_id}");
        match self.get_json::<TrStop>(&path, &[]).await {
            Ok(stop) => Ok(convert_stop(&stop)),
            Err(ProviderError::Unavailable {
                status: Some(400..=404),
                ..
            }) => {
                // Not a stop id; the search endpoint also resolves ids.
                Ok(self.search_stations(station_id).await?.into_iter().next())
            }
            Err(e) => Err(e),
        }
    }

    async fn find_nearby_station(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<Station>, ProviderError> {
        let raw: Vec<TrStop> = self
            .get_json(
                "/locations/nearby",
                &[
                    ("latitude", latitude.to_string()),
                    ("longitude", longitude.to_string()),
                    ("results", "1".to_string()),
                ],
            )
            .await?;

        Ok(raw.iter().find_map(convert_stop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind() {
        let db = TransportRestClient::db(&ProviderConfig::new(DB_BASE_URL)).unwrap();
        let vbb = TransportRestClient::vbb(&ProviderConfig::new(VBB_BASE_URL)).unwrap();

        assert_eq!(db.kind(), ProviderKind::Db);
        assert_eq!(vbb.kind(), ProviderKind::Vbb);
        assert_eq!(vbb.base_url, "https://v6.bvg.transport.rest");
    }
}
