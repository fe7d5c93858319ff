use anyhow::{Context, Result, anyhow};
use chrono::Duration;
use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf};

use crate::clock::Clock;
use crate::error::ConfigError;
use crate::timestamp::{OutOfRangePolicy, TimestampNormalizer};

/// Default freshness window when the config doesn't set one.
pub const DEFAULT_FRESHNESS_SECS: u64 = 120;

/// Where a station sits and how its API reports time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationConfig {
    pub latitude: f64,
    pub longitude: f64,

    /// IANA zone id, e.g. "America/Chicago".
    pub timezone: String,

    /// Years the station's clock is known to be ahead by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_offset: Option<i32>,
}

impl StationConfig {
    pub fn time_zone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimeZone(self.timezone.clone()))
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Station used when none is named on the command line.
    pub default_station: Option<String>,

    /// How long a reading counts as fresh, in seconds.
    pub freshness_secs: Option<u64>,

    /// Treatment of numeric timestamps that are neither plausible seconds nor
    /// milliseconds.
    #[serde(default)]
    pub out_of_range: OutOfRangePolicy,

    /// Example TOML:
    /// [stations.backyard]
    /// latitude = 41.88
    /// longitude = -87.63
    /// timezone = "America/Chicago"
    #[serde(default)]
    pub stations: HashMap<String, StationConfig>,
}

impl Config {
    /// Return the default station's name and settings.
    pub fn default_station(&self) -> Result<(&str, &StationConfig), ConfigError> {
        let name = self.default_station.as_deref().ok_or(ConfigError::NoDefaultStation)?;
        Ok((name, self.station(name)?))
    }

    pub fn station(&self, name: &str) -> Result<&StationConfig, ConfigError> {
        self.stations.get(name).ok_or_else(|| ConfigError::UnknownStation(name.to_string()))
    }

    /// Named station, or the default one when `name` is `None`.
    pub fn resolve_station<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a StationConfig), ConfigError> {
        match name {
            Some(name) => Ok((name, self.station(name)?)),
            None => self.default_station(),
        }
    }

    /// Make an already configured station the default.
    pub fn set_default_station(&mut self, name: &str) -> Result<(), ConfigError> {
        self.station(name)?;
        self.default_station = Some(name.to_string());
        Ok(())
    }

    /// Set/replace a station and make it the default if there is none yet.
    pub fn upsert_station(&mut self, name: &str, station: StationConfig) {
        self.stations.insert(name.to_string(), station);

        if self.default_station.is_none() {
            self.default_station = Some(name.to_string());
        }
    }

    pub fn freshness_window(&self) -> Duration {
        let secs = self.freshness_secs.unwrap_or(DEFAULT_FRESHNESS_SECS);
        Duration::seconds(secs.min(u64::from(u32::MAX)) as i64)
    }

    /// Normalizer configured with this file's policy and the station's year offset.
    pub fn normalizer<C: Clock>(&self, station: Option<&StationConfig>, clock: C) -> TimestampNormalizer<C> {
        TimestampNormalizer::with_clock(clock)
            .with_policy(self.out_of_range)
            .with_year_offset(station.and_then(|s| s.year_offset))
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;

        for (name, station) in &cfg.stations {
            station.time_zone().with_context(|| format!("Invalid station '{name}'"))?;
        }

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "station-dash", "station-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};

    fn chicago() -> StationConfig {
        StationConfig {
            latitude: 41.8781,
            longitude: -87.6298,
            timezone: "America/Chicago".into(),
            year_offset: None,
        }
    }

    #[test]
    fn default_station_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.default_station().unwrap_err();

        assert_eq!(err, ConfigError::NoDefaultStation);
        assert!(err.to_string().contains("Hint: run `station configure"));
    }

    #[test]
    fn upsert_sets_default_once() {
        let mut cfg = Config::default();

        cfg.upsert_station("backyard", chicago());
        cfg.upsert_station("cabin", StationConfig { latitude: 46.0, ..chicago() });

        let (name, station) = cfg.default_station().expect("default station must exist");
        assert_eq!(name, "backyard");
        assert_eq!(station.latitude, 41.8781);
        assert!(cfg.station("cabin").is_ok());
    }

    #[test]
    fn set_default_station_overrides_default() {
        let mut cfg = Config::default();
        cfg.upsert_station("backyard", chicago());
        cfg.upsert_station("cabin", chicago());

        cfg.set_default_station("cabin").expect("cabin is configured");

        let (name, _) = cfg.resolve_station(None).expect("default station must exist");
        assert_eq!(name, "cabin");
    }

    #[test]
    fn set_default_station_requires_known_station() {
        let mut cfg = Config::default();
        cfg.upsert_station("backyard", chicago());

        let err = cfg.set_default_station("nowhere").unwrap_err();
        assert_eq!(err, ConfigError::UnknownStation("nowhere".into()));
        assert_eq!(cfg.default_station.as_deref(), Some("backyard"));
    }

    #[test]
    fn unknown_station_is_reported() {
        let cfg = Config::default();
        let err = cfg.resolve_station(Some("nowhere")).unwrap_err();
        assert_eq!(err, ConfigError::UnknownStation("nowhere".into()));
    }

    #[test]
    fn time_zone_must_be_iana() {
        assert_eq!(chicago().time_zone(), Ok(chrono_tz::America::Chicago));

        let bad = StationConfig { timezone: "Mars/Olympus".into(), ..chicago() };
        assert_eq!(bad.time_zone(), Err(ConfigError::UnknownTimeZone("Mars/Olympus".into())));
    }

    #[test]
    fn parses_toml() {
        let cfg = Config::from_toml(
            r#"
            default_station = "backyard"
            freshness_secs = 300
            out_of_range = "substitute_now"

            [stations.backyard]
            latitude = 41.88
            longitude = -87.63
            timezone = "America/Chicago"
            year_offset = 2
            "#,
        )
        .expect("config should parse");

        assert_eq!(cfg.freshness_window(), Duration::seconds(300));
        assert_eq!(cfg.out_of_range, OutOfRangePolicy::SubstituteNow);
        assert_eq!(cfg.station("backyard").unwrap().year_offset, Some(2));
    }

    #[test]
    fn rejects_unknown_zone_in_toml() {
        let err = Config::from_toml(
            r#"
            [stations.backyard]
            latitude = 0.0
            longitude = 0.0
            timezone = "Nowhere/Special"
            "#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("Invalid station 'backyard'"));
    }

    #[test]
    fn defaults_when_fields_missing() {
        let cfg = Config::from_toml("").expect("empty config should parse");

        assert_eq!(cfg.freshness_window(), Duration::seconds(DEFAULT_FRESHNESS_SECS as i64));
        assert_eq!(cfg.out_of_range, OutOfRangePolicy::Reject);
        assert!(cfg.stations.is_empty());
    }

    #[test]
    fn toml_roundtrip() {
        let mut cfg = Config::default();
        cfg.upsert_station("backyard", StationConfig { year_offset: Some(1), ..chicago() });

        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let back = Config::from_toml(&text).expect("parse");

        assert_eq!(back.stations, cfg.stations);
        assert_eq!(back.default_station.as_deref(), Some("backyard"));
    }

    #[test]
    fn normalizer_uses_station_offset() {
        let mut cfg = Config::default();
        cfg.upsert_station("backyard", StationConfig { year_offset: Some(10), ..chicago() });

        let now = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let normalizer = cfg.normalizer(cfg.station("backyard").ok(), FixedClock(now));

        let shifted = (1_700_000_000_i64 + 10 * crate::timestamp::SECONDS_PER_YEAR).to_string();
        let payload = crate::payload::Measurement::new(shifted, "", "");
        assert_eq!(normalizer.most_recent(&payload), Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
    }
}
