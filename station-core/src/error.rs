use chrono::NaiveDate;
use thiserror::Error;

/// Failures of the sunrise/sunset calculation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolarError {
    #[error("Invalid coordinates ({latitude}, {longitude}): latitude must be in [-90, 90] and longitude in [-180, 180]")]
    InvalidInput { latitude: f64, longitude: f64 },

    #[error("No valid local time on {date} in time zone {zone}")]
    UnresolvableLocalTime { date: NaiveDate, zone: String },
}

/// Reasons a single raw timestamp token could not be turned into an instant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("Timestamp token is empty or zero")]
    Empty,

    #[error("Epoch value {value} is implausible as seconds or milliseconds")]
    OutOfRange { value: f64 },

    #[error("Timestamp '{0}' matches no known layout")]
    Unrecognized(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Unknown time zone '{0}'. Use an IANA identifier such as 'America/Chicago'.")]
    UnknownTimeZone(String),

    #[error("Unknown station '{0}'.\nHint: run `station configure {0}` first.")]
    UnknownStation(String),

    #[error(
        "No default station configured.\n\
         Hint: run `station configure <name>` (e.g. `station configure backyard`) first."
    )]
    NoDefaultStation,
}
