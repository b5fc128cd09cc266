//! Static HAFAS profile constants.
//!
//! A profile is everything region-specific about an `mgate` endpoint: where it
//! lives, how requests are signed, and how its product bitmask is laid out.

use chrono_tz::Tz;

use crate::domain::HafasProfile;

/// How a request body is signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumMode {
    /// Unsigned.
    None,
    /// `?checksum=md5(body + salt)`
    Checksum(&'static str),
    /// `?mic=md5(body)&mac=md5(mic + salt)`
    MicMac(&'static str),
}

/// One bit of a profile's product bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Product {
    pub bit: u32,
    /// Profile-specific product id.
    pub id: &'static str,
    /// Transport type display name.
    pub display: &'static str,
    pub icon: &'static str,
}

/// Constants for one HAFAS profile.
#[derive(Debug, Clone, Copy)]
pub struct ProfileConstants {
    pub name: HafasProfile,
    pub endpoint: &'static str,
    /// Some endpoints reject requests without an app user agent.
    pub user_agent: Option<&'static str>,
    pub locale: &'static str,
    pub language: &'static str,
    /// Time zone the station board times are expressed in.
    pub timezone: Tz,
    pub client_id: &'static str,
    pub client_version: &'static str,
    pub client_type: &'static str,
    pub client_name: &'static str,
    pub ext: &'static str,
    pub ver: &'static str,
    pub aid: &'static str,
    pub checksum: ChecksumMode,
    pub products: &'static [Product],
    /// Bitmask requested when no explicit product filter is given.
    pub default_products: u32,
}

impl ProfileConstants {
    /// Look up the product for a class bit.
    pub fn product(&self, cls: u32) -> Option<&'static Product> {
        self.products.iter().find(|p| p.bit == cls)
    }

    /// Bitmask for a set of transport type display names (case-insensitive).
    ///
    /// Falls back to the default bitmask when nothing matches.
    pub fn products_mask(&self, transport_types: Option<&[String]>) -> u32 {
        let Some(types) = transport_types else {
            return self.default_products;
        };
        let mask = self
            .products
            .iter()
            .filter(|p| types.iter().any(|t| t.eq_ignore_ascii_case(p.display)))
            .fold(0, |acc, p| acc | p.bit);

        if mask == 0 { self.default_products } else { mask }
    }
}

const DB_PRODUCTS: &[Product] = &[
    Product { bit: 1, id: "nationalExpress", display: "ICE", icon: "mdi:train" },
    Product { bit: 2, id: "national", display: "IC/EC", icon: "mdi:train" },
    Product { bit: 4, id: "regionalExpress", display: "RE", icon: "mdi:train" },
    Product { bit: 8, id: "regional", display: "RB", icon: "mdi:train" },
    Product { bit: 16, id: "suburban", display: "S-Bahn", icon: "mdi:subway-variant" },
    Product { bit: 32, id: "bus", display: "Bus", icon: "mdi:bus" },
    Product { bit: 64, id: "ferry", display: "Ferry", icon: "mdi:ferry" },
    Product { bit: 128, id: "subway", display: "U-Bahn", icon: "mdi:subway" },
    Product { bit: 256, id: "tram", display: "Tram", icon: "mdi:tram" },
    Product { bit: 512, id: "taxi", display: "Taxi", icon: "mdi:taxi" },
];

const BVG_PRODUCTS: &[Product] = &[
    Product { bit: 1, id: "suburban", display: "S-Bahn", icon: "mdi:subway-variant" },
    Product { bit: 2, id: "subway", display: "U-Bahn", icon: "mdi:subway" },
    Product { bit: 4, id: "tram", display: "Tram", icon: "mdi:tram" },
    Product { bit: 8, id: "bus", display: "Bus", icon: "mdi:bus" },
    Product { bit: 16, id: "ferry", display: "Ferry", icon: "mdi:ferry" },
    Product { bit: 32, id: "regional", display: "RB", icon: "mdi:train" },
    Product { bit: 64, id: "regional_express", display: "RE", icon: "mdi:train" },
    Product { bit: 128, id: "long_distance", display: "IC/EC", icon: "mdi:train" },
    Product { bit: 256, id: "long_distance_express", display: "ICE", icon: "mdi:train" },
];

static DB: ProfileConstants = ProfileConstants {
    name: HafasProfile::Db,
    endpoint: "https://reiseauskunft.bahn.de/bin/mgate.exe",
    user_agent: None,
    locale: "de-DE",
    language: "de",
    timezone: chrono_tz::Europe::Berlin,
    client_id: "DB",
    client_version: "16040000",
    client_type: "IPH",
    client_name: "DB Navigator",
    ext: "DB.R21.12.a",
    ver: "1.15",
    aid: "n91dB8Z77MLdoR0K",
    checksum: ChecksumMode::MicMac("bdI8UVj40K5fvxwf"),
    products: DB_PRODUCTS,
    default_products: 1023,
};

static BVG: ProfileConstants = ProfileConstants {
    name: HafasProfile::Bvg,
    endpoint: "https://fahrinfo.vbb.de/bin/mgate.exe",
    user_agent: Some("VBB/3.0.0 (iPhone; iOS 13.1.2; Scale/2.00)"),
    locale: "de-DE",
    language: "de",
    timezone: chrono_tz::Europe::Berlin,
    client_id: "VBB",
    client_version: "3000000",
    client_type: "IPH",
    client_name: "VBB",
    ext: "VBB.R21.12.a",
    ver: "1.15",
    aid: "n91dB8Z77MLdoR0K",
    checksum: ChecksumMode::Checksum("7x8i3q2m5N9wV4vR"),
    products: BVG_PRODUCTS,
    // Everything except long distance trains.
    default_products: 127,
};

/// Constants for a profile.
pub fn constants(profile: HafasProfile) -> &'static ProfileConstants {
    match profile {
        HafasProfile::Db => &DB,
        HafasProfile::Bvg => &BVG,
    }
}
