use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use inquire::{CustomType, Text, validator::Validation};
use tracing::debug;

use station_core::{
    Clock, Config, GeoTimeQuery, StationConfig, SystemClock, TimestampSource, WeatherPayload,
    next_sun_event,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "station", version, about = "Weather station sun times and data freshness")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set coordinates and time zone for a station.
    Configure {
        /// Station name, e.g. "backyard".
        name: String,
    },

    /// Make a configured station the default.
    Default {
        /// Station name, e.g. "backyard".
        name: String,
    },

    /// Show sunrise, sunset and day length for a station.
    Sun {
        /// Station name; the default station if absent.
        #[arg(long)]
        station: Option<String>,

        /// Date as YYYY-MM-DD; if absent, means "today" in the station's zone.
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Report when a saved station payload was recorded and whether it is fresh.
    Freshness {
        /// Path to a JSON payload, bare or wrapped in the API response envelope.
        payload: PathBuf,

        /// Station name; the default station if absent.
        #[arg(long)]
        station: Option<String>,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Command::Configure { name } => configure(&name),
            Command::Default { name } => set_default(&name),
            Command::Sun { station, date } => show_sun(station.as_deref(), date),
            Command::Freshness { payload, station } => show_freshness(&payload, station.as_deref()),
        }
    }
}

fn configure(name: &str) -> Result<()> {
    let mut config = Config::load()?;
    let existing = config.stations.get(name).cloned();

    let latitude = CustomType::<f64>::new("Latitude (decimal degrees):")
        .with_default(existing.as_ref().map_or(0.0, |s| s.latitude))
        .with_error_message("Please enter a number")
        .with_validator(|v: &f64| {
            Ok(if (-90.0..=90.0).contains(v) {
                Validation::Valid
            } else {
                Validation::Invalid("Latitude must be between -90 and 90".into())
            })
        })
        .prompt()?;

    let longitude = CustomType::<f64>::new("Longitude (decimal degrees):")
        .with_default(existing.as_ref().map_or(0.0, |s| s.longitude))
        .with_error_message("Please enter a number")
        .with_validator(|v: &f64| {
            Ok(if (-180.0..=180.0).contains(v) {
                Validation::Valid
            } else {
                Validation::Invalid("Longitude must be between -180 and 180".into())
            })
        })
        .prompt()?;

    let current_zone = existing.as_ref().map_or("UTC", |s| s.timezone.as_str());
    let timezone = Text::new("Time zone (IANA id, e.g. America/Chicago):")
        .with_default(current_zone)
        .with_validator(|tz: &str| {
            Ok(if tz.trim().parse::<Tz>().is_ok() {
                Validation::Valid
            } else {
                Validation::Invalid("Unknown time zone".into())
            })
        })
        .prompt()?;

    let year_offset = CustomType::<i32>::new("Years the station clock runs ahead (0 if correct):")
        .with_default(existing.as_ref().and_then(|s| s.year_offset).unwrap_or(0))
        .with_error_message("Please enter a whole number")
        .prompt()?;

    config.upsert_station(
        name,
        StationConfig {
            latitude,
            longitude,
            timezone: timezone.trim().to_string(),
            year_offset: (year_offset != 0).then_some(year_offset),
        },
    );
    config.save()?;

    println!("Saved station '{name}' to {}", Config::config_file_path()?.display());
    Ok(())
}

fn set_default(name: &str) -> Result<()> {
    let mut config = Config::load()?;
    config.set_default_station(name)?;
    config.save()?;

    println!("Default station is now '{name}'");
    Ok(())
}

fn show_sun(station: Option<&str>, date: Option<NaiveDate>) -> Result<()> {
    let config = Config::load()?;
    let (name, station) = config.resolve_station(station)?;
    let zone = station.time_zone()?;
    let clock = SystemClock;

    let date = date.unwrap_or_else(|| clock.now().with_timezone(&zone).date_naive());
    let times = GeoTimeQuery::new(date, station.latitude, station.longitude, zone)
        .compute()
        .with_context(|| format!("Failed to compute sun times for station '{name}'"))?;

    println!("{name} ({:.4}, {:.4}) {date} [{zone}]", station.latitude, station.longitude);
    match times.polar {
        Some(polar) => println!("  Polar {polar:?}: no sunrise or sunset"),
        None => {
            println!("  Sunrise:    {}", times.sunrise.format("%H:%M %Z"));
            println!("  Solar noon: {}", times.solar_noon.format("%H:%M %Z"));
            println!("  Sunset:     {}", times.sunset.format("%H:%M %Z"));
        }
    }
    println!("  Day length: {}", format_duration(times.day_length));

    let next = next_sun_event(station.latitude, station.longitude, zone, &clock);
    let state = if next.is_daylight { "day" } else { "night" };
    println!(
        "  Now: {state}, next {} at {}",
        next.kind.as_str().to_lowercase(),
        next.at.with_timezone(&zone).format("%Y-%m-%d %H:%M %Z")
    );

    Ok(())
}

fn show_freshness(path: &Path, station: Option<&str>) -> Result<()> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload file: {}", path.display()))?;
    let payload = WeatherPayload::from_json(&body)?;

    let config = Config::load()?;
    let station = match station {
        Some(name) => Some(config.station(name)?),
        None => config.default_station().ok().map(|(_, s)| s),
    };
    let zone = station.map(StationConfig::time_zone).transpose()?;

    debug!(tokens = payload.all_timestamps().len(), "collected payload timestamps");

    let normalizer = config.normalizer(station, SystemClock);
    let recorded = normalizer.extract_most_recent_timestamp(&payload);
    let window = config.freshness_window();
    let fresh = normalizer.is_fresh(recorded, window);

    println!("Recorded at: {}", render_instant(recorded, zone));
    println!("Age:         {}", normalizer.age_label(recorded));
    println!(
        "Status:      {} (window {})",
        if fresh { "fresh" } else { "stale" },
        format_duration(window)
    );

    Ok(())
}

fn render_instant(at: DateTime<Utc>, zone: Option<Tz>) -> String {
    match zone {
        Some(zone) => at.with_timezone(&zone).format("%Y-%m-%d %H:%M:%S %Z").to_string(),
        None => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    }
}

fn format_duration(d: Duration) -> String {
    let minutes = d.num_minutes();
    if minutes < 60 {
        return format!("{minutes}m");
    }
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}
