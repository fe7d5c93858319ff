//! Core library for the `station` dashboard tools.
//!
//! This crate defines:
//! - Sunrise/sunset/day-length calculation for any point and time zone
//! - Normalization of per-sensor station timestamps into one "recorded at" instant
//! - The station payload shape and the [`TimestampSource`] capability
//! - Configuration (station coordinates, freshness window, timestamp policy)
//!
//! Everything here is synchronous and free of shared state; "now" comes from an
//! injectable [`Clock`].

pub mod clock;
pub mod config;
pub mod error;
pub mod payload;
pub mod solar;
pub mod timestamp;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, StationConfig};
pub use error::{ConfigError, SolarError, TimestampError};
pub use payload::{TimestampSource, WeatherPayload};
pub use solar::{GeoTimeQuery, NextSunEvent, SunEventKind, SunTimes, compute_sun_times, next_sun_event};
pub use timestamp::{OutOfRangePolicy, TimestampNormalizer, format_data_age, is_data_fresh};
