//! Station values and station identifier helpers.

use std::fmt;

/// A public transport station as reported by a provider.
///
/// The identifier is scoped to the provider that produced it: an MVG global id
/// (`de:09162:6`), a DB/VBB stop id (`8000261`, `900100003`) or a HAFAS
/// external id.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub place: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Station {
    /// Create a station.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        place: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            place: place.into(),
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.place.is_empty() {
            write!(f, "{} ({})", self.name, self.id)
        } else {
            write!(f, "{}, {} ({})", self.name, self.place, self.id)
        }
    }
}

/// Returns true if `id` identifies a single stop point within a station.
///
/// Stop point ids extend a global station id with two equal trailing
/// segments, e.g. `de:09162:1108:1:1` is stop point 1 of `de:09162:1108`.
///
/// # Examples
///
/// ```
/// use departures_server::domain::is_stop_point_id;
///
/// assert!(is_stop_point_id("de:09162:1108:1:1"));
/// assert!(!is_stop_point_id("de:09162:1108"));
/// assert!(!is_stop_point_id("de:09162:1108:1:2"));
/// ```
pub fn is_stop_point_id(id: &str) -> bool {
    let parts: Vec<&str> = id.split(':').collect();
    parts.len() >= 5 && parts[parts.len() - 1] == parts[parts.len() - 2]
}

/// Returns the station id to query upstream for a configured id.
///
/// Providers only accept the base station id, so a stop point id is cut down
/// to its first three segments. Any other id is returned unchanged.
pub fn base_station_id(id: &str) -> &str {
    if !is_stop_point_id(id) {
        return id;
    }

    // Byte offset of the third ':' separator.
    match id.match_indices(':').nth(2) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_point_detection() {
        assert!(is_stop_point_id("de:09162:1108:1:1"));
        assert!(is_stop_point_id("de:09162:1108:12:12"));
        assert!(!is_stop_point_id("de:09162:1108"));
        assert!(!is_stop_point_id("de:09162:1108:1:2"));
        assert!(!is_stop_point_id("8000261"));
        assert!(!is_stop_point_id(""));
    }

    #[test]
    fn base_id_of_stop_point() {
        assert_eq!(base_station_id("de:09162:1108:1:1"), "de:09162:1108");
        assert_eq!(base_station_id("de:09162:6"), "de:09162:6");
        assert_eq!(base_station_id("900100003"), "900100003");
    }

    #[test]
    fn display_with_and_without_place() {
        let hbf = Station::new("de:09162:6", "Hauptbahnhof", "München", 48.14, 11.56);
        assert_eq!(hbf.to_string(), "Hauptbahnhof, München (de:09162:6)");

        let alex = Station::new("900100003", "S+U Alexanderplatz", "", 52.52, 13.41);
        assert_eq!(alex.to_string(), "S+U Alexanderplatz (900100003)");
    }
}
