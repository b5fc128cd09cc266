//! Upstream provider names.
//!
//! Provider and profile names arrive as strings in configuration. They are
//! parsed into these enums once at load time so that an unknown name fails
//! fast instead of at the first request.

use std::fmt;

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown API provider '{name}' (expected one of: mvg, db, vbb, hafas)")]
pub struct UnknownProvider {
    name: String,
}

/// Error returned when parsing an unknown HAFAS profile name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown HAFAS profile '{name}' (expected one of: auto, db, bvg)")]
pub struct UnknownHafasProfile {
    name: String,
}

/// A supported upstream departure API.
///
/// Also used as the key under which the composite repository memoizes its
/// adapter instances and the rate limiter registry its limiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ProviderKind {
    /// Münchner Verkehrsgesellschaft API (primary provider).
    #[default]
    Mvg,
    /// Deutsche Bahn via v6.db.transport.rest.
    Db,
    /// Berlin/Brandenburg via v6.bvg.transport.rest.
    Vbb,
    /// HAFAS `mgate` protocol with per-region profiles.
    Hafas,
}

impl ProviderKind {
    /// All supported providers.
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Mvg,
        ProviderKind::Db,
        ProviderKind::Vbb,
        ProviderKind::Hafas,
    ];

    /// Parse a provider name (case-insensitive, surrounding whitespace ignored).
    pub fn parse(s: &str) -> Result<Self, UnknownProvider> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mvg" => Ok(ProviderKind::Mvg),
            "db" => Ok(ProviderKind::Db),
            "vbb" => Ok(ProviderKind::Vbb),
            "hafas" => Ok(ProviderKind::Hafas),
            _ => Err(UnknownProvider {
                name: s.to_string(),
            }),
        }
    }

    /// Returns the canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Mvg => "mvg",
            ProviderKind::Db => "db",
            ProviderKind::Vbb => "vbb",
            ProviderKind::Hafas => "hafas",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A known HAFAS regional profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HafasProfile {
    /// Deutsche Bahn (nationwide).
    Db,
    /// Berliner Verkehrsbetriebe / VBB.
    Bvg,
}

impl HafasProfile {
    /// Order in which profiles are tried when auto-detecting.
    pub const DETECTION_ORDER: [HafasProfile; 2] = [HafasProfile::Db, HafasProfile::Bvg];

    /// Returns the canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HafasProfile::Db => "db",
            HafasProfile::Bvg => "bvg",
        }
    }
}

impl fmt::Display for HafasProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The HAFAS profile configured for a stop: either a fixed profile or
/// auto-detection per station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HafasProfileName {
    #[default]
    Auto,
    Named(HafasProfile),
}

impl HafasProfileName {
    /// Parse a profile name. Empty input and `auto` both mean auto-detection.
    pub fn parse(s: &str) -> Result<Self, UnknownHafasProfile> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(HafasProfileName::Auto),
            "db" => Ok(HafasProfileName::Named(HafasProfile::Db)),
            "bvg" | "vbb" => Ok(HafasProfileName::Named(HafasProfile::Bvg)),
            _ => Err(UnknownHafasProfile {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for HafasProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HafasProfileName::Auto => f.write_str("auto"),
            HafasProfileName::Named(p) => f.write_str(p.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_providers() {
        assert_eq!(ProviderKind::parse("mvg"), Ok(ProviderKind::Mvg));
        assert_eq!(ProviderKind::parse("DB"), Ok(ProviderKind::Db));
        assert_eq!(ProviderKind::parse(" vbb "), Ok(ProviderKind::Vbb));
        assert_eq!(ProviderKind::parse("Hafas"), Ok(ProviderKind::Hafas));
    }

    #[test]
    fn reject_unknown_provider() {
        let err = ProviderKind::parse("efa").unwrap_err();
        assert!(err.to_string().contains("'efa'"));
        assert!(ProviderKind::parse("").is_err());
    }

    #[test]
    fn default_provider_is_primary() {
        assert_eq!(ProviderKind::default(), ProviderKind::Mvg);
    }

    #[test]
    fn parse_profiles() {
        assert_eq!(HafasProfileName::parse(""), Ok(HafasProfileName::Auto));
        assert_eq!(HafasProfileName::parse("AUTO"), Ok(HafasProfileName::Auto));
        assert_eq!(
            HafasProfileName::parse("db"),
            Ok(HafasProfileName::Named(HafasProfile::Db))
        );
        assert_eq!(
            HafasProfileName::parse("vbb"),
            Ok(HafasProfileName::Named(HafasProfile::Bvg))
        );
        assert!(HafasProfileName::parse("vvo").is_err());
    }

    #[test]
    fn display_matches_as_str() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.to_string(), kind.as_str());
        }
        assert_eq!(HafasProfileName::Auto.to_string(), "auto");
    }
}
