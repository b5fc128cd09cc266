//! Canonical departure value.

use chrono::{DateTime, Utc};

/// A single departure from a station, independent of the upstream provider.
///
/// Both `time` (live/expected) and `planned_time` are always present; when a
/// provider has no live data the two are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// Live (expected) departure time.
    pub time: DateTime<Utc>,

    /// Scheduled departure time.
    pub planned_time: DateTime<Utc>,

    /// Delay in seconds, if the provider reports one.
    pub delay_seconds: Option<i64>,

    /// Platform, track or stop position label.
    pub platform: Option<String>,

    /// Whether `time` comes from live data.
    pub is_realtime: bool,

    /// Line label (e.g. "U2", "S8", "100").
    pub line: String,

    /// Destination shown on the vehicle.
    pub destination: String,

    /// Display name of the transport type (e.g. "U-Bahn", "Bus").
    pub transport_type: String,

    /// Icon key for the transport type (e.g. "mdi:subway"), empty if unknown.
    pub icon: String,

    /// Whether this departure is cancelled.
    pub is_cancelled: bool,

    /// Free-text service messages attached to the departure.
    pub messages: Vec<String>,

    /// Identifier of the physical stop point (platform/pole) within the station.
    pub stop_point_id: Option<String>,
}

impl Departure {
    /// Create a scheduled departure with no live data and no optional fields.
    pub fn scheduled(
        line: impl Into<String>,
        destination: impl Into<String>,
        transport_type: impl Into<String>,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            time,
            planned_time: time,
            delay_seconds: None,
            platform: None,
            is_realtime: false,
            line: line.into(),
            destination: destination.into(),
            transport_type: transport_type.into(),
            icon: String::new(),
            is_cancelled: false,
            messages: Vec::new(),
            stop_point_id: None,
        }
    }

    /// Set the live time, deriving the delay from the planned time.
    pub fn with_live_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self.delay_seconds = Some((time - self.planned_time).num_seconds());
        self.is_realtime = true;
        self
    }

    /// Set the platform.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Set the stop point identifier.
    pub fn with_stop_point(mut self, stop_point_id: impl Into<String>) -> Self {
        self.stop_point_id = Some(stop_point_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn scheduled_has_equal_times() {
        let t = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let dep = Departure::scheduled("U2", "Messestadt Ost", "U-Bahn", t);

        assert_eq!(dep.time, dep.planned_time);
        assert_eq!(dep.delay_seconds, None);
        assert!(!dep.is_realtime);
    }

    #[test]
    fn live_time_derives_delay() {
        let planned = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let live = Utc.with_ymd_and_hms(2024, 3, 15, 10, 3, 0).unwrap();
        let dep = Departure::scheduled("S2", "Erding", "S-Bahn", planned).with_live_time(live);

        assert_eq!(dep.time, live);
        assert_eq!(dep.planned_time, planned);
        assert_eq!(dep.delay_seconds, Some(180));
        assert!(dep.is_realtime);
    }
}
