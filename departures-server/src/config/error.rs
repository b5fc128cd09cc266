//! Configuration loading errors.

use std::path::PathBuf;

use crate::domain::{UnknownHafasProfile, UnknownProvider};

/// Errors raised while loading configuration. Never raised at request time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML or does not have the expected shape
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{location}: {source}")]
    UnknownProvider {
        location: String,
        #[source]
        source: UnknownProvider,
    },

    #[error("{location}: {source}")]
    UnknownHafasProfile {
        location: String,
        #[source]
        source: UnknownHafasProfile,
    },

    /// A stop has no (or a blank) `station_id`
    #[error("{location}: station_id is required")]
    MissingStationId { location: String },

    /// A numeric field is out of range
    #[error("{location}: {field} {message}")]
    InvalidValue {
        location: String,
        field: &'static str,
        message: String,
    },
}
