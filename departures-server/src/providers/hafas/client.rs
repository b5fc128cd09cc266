//! HAFAS `mgate` HTTP client with per-station profile detection.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::{Departure, HafasProfile, HafasProfileName, ProviderKind, Station};
use crate::providers::http::{ProviderConfig, build_client, read_json};
use crate::providers::{DepartureQuery, ProviderAdapter, ProviderError};

use super::convert::{convert_board, convert_location};
use super::profile::{ProfileConstants, constants};
use super::request;
use super::types::{LocList, LocMatchResult, MgateResponse, StationBoardResult};

const PROVIDER: ProviderKind = ProviderKind::Hafas;

/// Profile used for station lookups, which carry no profile of their own.
const LOOKUP_PROFILE: HafasProfile = HafasProfile::Db;

/// HAFAS client.
///
/// The endpoint comes from the profile of each request. A non-empty
/// `base_url` in the config overrides it for every profile (for testing).
#[derive(Debug)]
pub struct HafasClient {
    http: reqwest::Client,
    endpoint_override: Option<String>,
    /// Profiles detected for `auto` stations.
    detected: RwLock<HashMap<String, HafasProfile>>,
}

impl HafasClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            http: build_client(PROVIDER, config)?,
            endpoint_override: (!config.base_url.is_empty()).then(|| config.base_url.clone()),
            detected: RwLock::new(HashMap::new()),
        })
    }

    /// Profile previously detected for a station.
    pub fn detected_profile(&self, station_id: &str) -> Option<HafasProfile> {
        self.detected
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(station_id)
            .copied()
    }

    /// Send one `mgate` request and unwrap its single service result.
    async fn call<T: DeserializeOwned>(
        &self,
        profile: &ProfileConstants,
        body: &Value,
    ) -> Result<T, ProviderError> {
        let body = body.to_string();
        let endpoint = self.endpoint_override.as_deref().unwrap_or(profile.endpoint);

        let mut req = self
            .http
            .post(endpoint)
            .query(&request::signature(profile.checksum, &body))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT_LANGUAGE, profile.locale);
        if let Some(user_agent) = profile.user_agent {
            req = req.header(reqwest::header::USER_AGENT, user_agent);
        }

        let response = req
            .body(body)
            .send()
            .await
            .map_err(|e| ProviderError::http(PROVIDER, e))?;
        let parsed: MgateResponse<T> = read_json(PROVIDER, response).await?;

        unwrap_response(parsed)
    }

    async fn station_board(
        &self,
        profile: HafasProfile,
        query: &DepartureQuery,
        max_journeys: usize,
    ) -> Result<Vec<Departure>, ProviderError> {
        let consts = constants(profile);
        let body = request::station_board(
            consts,
            &query.station_id,
            Utc::now(),
            query.window_minutes,
            max_journeys,
            consts.products_mask(query.transport_types.as_deref()),
        );
        let board: StationBoardResult = self.call(consts, &body).await?;
        Ok(convert_board(&board, consts))
    }

    /// Find the profile that serves `station_id`.
    ///
    /// Tries each known profile in order and remembers the first that
    /// returns departures. If none does, the first profile that answered with
    /// an empty board is used; if every profile failed, the lookup profile.
    async fn detect_profile(&self, station_id: &str) -> HafasProfile {
        if let Some(profile) = self.detected_profile(station_id) {
            return profile;
        }

        let sample = DepartureQuery::new(station_id, 1);
        let mut first_empty = None;

        for profile in HafasProfile::DETECTION_ORDER {
            match self.station_board(profile, &sample, 1).await {
                Ok(deps) if !deps.is_empty() => {
                    info!(station = station_id, %profile, "detected HAFAS profile");
                    self.remember(station_id, profile);
                    return profile;
                }
                Ok(_) => {
                    debug!(station = station_id, %profile, "HAFAS profile returned no departures");
                    first_empty.get_or_insert(profile);
                }
                Err(e) => {
                    debug!(station = station_id, %profile, error = %e, "HAFAS profile failed");
                }
            }
        }

        match first_empty {
            Some(profile) => {
                warn!(station = station_id, %profile, "no HAFAS profile returned departures, using first empty one");
                self.remember(station_id, profile);
                profile
            }
            None => {
                warn!(station = station_id, profile = %LOOKUP_PROFILE, "could not detect HAFAS profile");
                LOOKUP_PROFILE
            }
        }
    }

    fn remember(&self, station_id: &str, profile: HafasProfile) {
        self.detected
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(station_id.to_string(), profile);
    }

    async fn search_locations(&self, query: &str) -> Result<Vec<Station>, ProviderError> {
        let consts = constants(LOOKUP_PROFILE);
        let body = request::loc_match(consts, query);
        let result: LocMatchResult = self.call(consts, &body).await?;

        Ok(result
            .matches
            .map(|m| m.loc_l.iter().filter_map(convert_location).collect())
            .unwrap_or_default())
    }
}

/// Extract the single service result, mapping HAFAS error codes.
fn unwrap_response<T>(response: MgateResponse<T>) -> Result<T, ProviderError> {
    if let Some(err) = response.err.as_deref().filter(|e| *e != "OK") {
        return Err(ProviderError::data(
            PROVIDER,
            format!("{err}: {}", response.err_txt.unwrap_or_default()),
        ));
    }

    let svc = response
        .svc_res_l
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::data(PROVIDER, "empty svcResL"))?;

    if let Some(err) = svc.err.as_deref().filter(|e| *e != "OK") {
        return Err(ProviderError::data(
            PROVIDER,
            format!("{err}: {}", svc.err_txt.unwrap_or_default()),
        ));
    }

    svc.res
        .ok_or_else(|| ProviderError::data(PROVIDER, "service result without res"))
}

#[async_trait]
impl ProviderAdapter for HafasClient {
    fn kind(&self) -> ProviderKind {
        PROVIDER
    }

    async fn fetch_departures(
        &self,
        query: &DepartureQuery,
    ) -> Result<Vec<Departure>, ProviderError> {
        let profile = match query.hafas_profile {
            HafasProfileName::Named(profile) => profile,
            HafasProfileName::Auto => self.detect_profile(&query.station_id).await,
        };

        let departures = self
            .station_board(profile, query, query.overfetch_limit())
            .await?;
        debug!(station = %query.station_id, %profile, count = departures.len(), "HAFAS departures");

        Ok(query.finish(departures))
    }

    async fn search_stations(&self, query: &str) -> Result<Vec<Station>, ProviderError> {
        self.search_locations(query).await
    }

    async fn get_station(&self, station_id: &str) -> Result<Option<Station>, ProviderError> {
        Ok(self
            .search_locations(station_id)
            .await?
            .into_iter()
            .find(|s| s.id == station_id))
    }

    async fn find_nearby_station(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<Station>, ProviderError> {
        let consts = constants(LOOKUP_PROFILE);
        let body = request::loc_geo_pos(consts, latitude, longitude);
        let result: LocList = self.call(consts, &body).await?;

        Ok(result.loc_l.iter().find_map(convert_location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> MgateResponse<LocList> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn unwraps_ok_result() {
        let resp = parse(
            r#"{"err": "OK", "svcResL": [{"meth": "LocGeoPos", "err": "OK",
                "res": {"locL": [{"type": "S", "name": "Berlin Hbf", "extId": "8011160"}]}}]}"#,
        );
        let list = unwrap_response(resp).unwrap();
        assert_eq!(list.loc_l.len(), 1);
    }

    fn parse_any<T: DeserializeOwned>(json: &str) -> Result<T, ProviderError> {
        let resp: MgateResponse<T> = serde_json::from_str(json).unwrap();
        unwrap_response(resp)
    }

    #[test]
    fn payload_needs_no_default() {
        #[derive(Debug, serde::Deserialize)]
        struct Ping {
            count: u32,
        }

        let ping: Ping =
            parse_any(r#"{"err": "OK", "svcResL": [{"err": "OK", "res": {"count": 3}}]}"#).unwrap();
        assert_eq!(ping.count, 3);

        let board: StationBoardResult = parse_any(
            r#"{"svcResL": [{"err": "OK", "res": {"common": {}, "jnyL": []}}]}"#,
        )
        .unwrap();
        assert!(board.jny_l.is_empty());
    }

    #[test]
    fn service_error_is_data_error() {
        let resp = parse(
            r#"{"err": "OK", "svcResL": [{"meth": "StationBoard", "err": "LOCATION",
                "errTxt": "HCI Service: location missing or invalid"}]}"#,
        );
        let err = unwrap_response(resp).unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("LOCATION"));
    }

    #[test]
    fn top_level_error() {
        let resp = parse(r#"{"err": "AUTH", "errTxt": "invalid checksum"}"#);
        let err = unwrap_response(resp).unwrap_err();
        assert!(err.to_string().contains("AUTH: invalid checksum"));
    }

    #[test]
    fn empty_results() {
        assert!(unwrap_response(parse(r#"{"svcResL": []}"#)).is_err());
    }

    #[test]
    fn endpoint_override_only_when_configured() {
        let client = HafasClient::new(&ProviderConfig::new("")).unwrap();
        assert_eq!(client.endpoint_override, None);

        let client = HafasClient::new(&ProviderConfig::new("http://localhost:1/mgate")).unwrap();
        assert_eq!(client.endpoint_override.as_deref(), Some("http://localhost:1/mgate"));
        assert_eq!(client.detected_profile("900100003"), None);
    }
}
