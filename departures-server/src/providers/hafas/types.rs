//! HAFAS `mgate` response DTOs.
//!
//! Responses are deeply indexed: journeys refer to products, remarks and
//! locations by position in the shared `common` lists (`prodX`, `remX`,
//! `locX`). Only the fields needed for display are modelled.

use serde::Deserialize;

/// Top-level `mgate` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct MgateResponse<T> {
    /// `OK` on success.
    pub err: Option<String>,
    pub err_txt: Option<String>,
    #[serde(default)]
    pub svc_res_l: Vec<ServiceResult<T>>,
}

/// Result of one request in `svcReqL`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct ServiceResult<T> {
    pub meth: Option<String>,
    /// `OK` on success, e.g. `LOCATION` for an unknown station.
    pub err: Option<String>,
    pub err_txt: Option<String>,
    pub res: Option<T>,
}

/// Lists referenced by index from journeys.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Common {
    #[serde(default)]
    pub loc_l: Vec<Location>,
    #[serde(default)]
    pub prod_l: Vec<ProductRef>,
    #[serde(default)]
    pub rem_l: Vec<Remark>,
}

/// `StationBoard` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationBoardResult {
    #[serde(default)]
    pub common: Common,
    #[serde(default)]
    pub jny_l: Vec<Journey>,
}

/// A journey passing the station.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journey {
    /// Operating day, `YYYYMMDD`.
    pub date: String,
    pub prod_x: Option<usize>,
    pub dir_txt: Option<String>,
    pub stb_stop: StopInfo,
    #[serde(default)]
    pub msg_l: Vec<MessageRef>,
    #[serde(default)]
    pub is_cncl: bool,
}

/// Departure details at the board station.
///
/// Times are `HHMMSS`, optionally prefixed with a two-digit day offset
/// relative to the journey date.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopInfo {
    pub loc_x: Option<usize>,
    /// Scheduled departure time.
    pub d_time_s: Option<String>,
    /// Live departure time.
    pub d_time_r: Option<String>,
    /// Scheduled platform (older format).
    pub d_platf_s: Option<String>,
    /// Live platform (older format).
    pub d_platf_r: Option<String>,
    /// Scheduled platform (newer format).
    pub d_pltf_s: Option<Platform>,
    /// Live platform (newer format).
    pub d_pltf_r: Option<Platform>,
    #[serde(default)]
    pub d_cncl: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Platform {
    pub txt: Option<String>,
}

/// A product (line).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub name: Option<String>,
    /// Short name, e.g. `S7` for `S 7`.
    pub name_s: Option<String>,
    /// Product class bit.
    pub cls: Option<u32>,
}

/// A remark referenced from a journey.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remark {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub code: Option<String>,
    pub txt_n: Option<String>,
}

/// A journey message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    /// `REM` for remarks; other types (HIMs) are ignored.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub rem_x: Option<usize>,
}

/// A location (station, address or POI).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// `S` for stations.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub ext_id: Option<String>,
    pub crd: Option<Coordinates>,
}

/// Coordinates in microdegrees.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Coordinates {
    pub x: i64,
    pub y: i64,
}

/// `LocMatch` result.
#[derive(Debug, Clone, Deserialize)]
pub struct LocMatchResult {
    #[serde(rename = "match")]
    pub matches: Option<LocList>,
}

/// `LocGeoPos` result, also the inner list of `LocMatch`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocList {
    #[serde(default)]
    pub loc_l: Vec<Location>,
}
