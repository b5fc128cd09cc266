//! `mgate` request bodies and request signing.

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde_json::{Value, json};

use super::profile::{ChecksumMode, ProfileConstants};

/// Radius for nearby station searches, in metres.
const NEARBY_MAX_DIST: u32 = 1000;

/// Maximum number of locations returned by a search.
const MAX_LOCATIONS: u32 = 20;

/// Wrap a single service request with the profile's client block.
fn envelope(profile: &ProfileConstants, meth: &str, req: Value) -> Value {
    json!({
        "lang": profile.language,
        "svcReqL": [{ "meth": meth, "req": req }],
        "client": {
            "id": profile.client_id,
            "v": profile.client_version,
            "type": profile.client_type,
            "name": profile.client_name,
        },
        "ext": profile.ext,
        "ver": profile.ver,
        "auth": { "type": "AID", "aid": profile.aid },
    })
}

/// `StationBoard` departures request.
pub fn station_board(
    profile: &ProfileConstants,
    station_id: &str,
    when: DateTime<Utc>,
    duration_minutes: u32,
    max_journeys: usize,
    products: u32,
) -> Value {
    let local = when.with_timezone(&profile.timezone);
    envelope(
        profile,
        "StationBoard",
        json!({
            "type": "DEP",
            "stbLoc": { "lid": format!("A=1@L={station_id}@"), "type": "S" },
            "date": local.format("%Y%m%d").to_string(),
            "time": local.format("%H%M%S").to_string(),
            "dur": duration_minutes,
            "maxJny": max_journeys,
            "jnyFltrL": [{ "type": "PROD", "mode": "INC", "value": products.to_string() }],
        }),
    )
}

/// `LocMatch` station search request.
pub fn loc_match(profile: &ProfileConstants, query: &str) -> Value {
    envelope(
        profile,
        "LocMatch",
        json!({
            "input": {
                "loc": { "type": "S", "name": format!("{query}?") },
                "maxLoc": MAX_LOCATIONS,
                "field": "S",
            },
        }),
    )
}

/// `LocGeoPos` nearby station request.
pub fn loc_geo_pos(profile: &ProfileConstants, latitude: f64, longitude: f64) -> Value {
    envelope(
        profile,
        "LocGeoPos",
        json!({
            "ring": {
                "cCrd": {
                    "x": (longitude * 1_000_000.0).round() as i64,
                    "y": (latitude * 1_000_000.0).round() as i64,
                },
                "maxDist": NEARBY_MAX_DIST,
            },
            "getPOIs": false,
            "getStops": true,
            "maxLoc": 1,
        }),
    )
}

fn md5_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Md5::new();
    for part in parts {
        hasher.update(part);
    }
    format!("{:x}", hasher.finalize())
}

/// Query parameters that sign `body` for the profile.
pub fn signature(mode: ChecksumMode, body: &str) -> Vec<(&'static str, String)> {
    match mode {
        ChecksumMode::None => Vec::new(),
        ChecksumMode::Checksum(salt) => {
            vec![("checksum", md5_hex(&[body.as_bytes(), salt.as_bytes()]))]
        }
        ChecksumMode::MicMac(salt) => {
            let mic = md5_hex(&[body.as_bytes()]);
            let mac = md5_hex(&[mic.as_bytes(), salt.as_bytes()]);
            vec![("mic", mic), ("mac", mac)]
        }
    }
}
