//! Sunrise, sunset and day length for an arbitrary point, date and time zone.
//!
//! Uses a low-order declination / equation-of-time approximation with the
//! "official" 90.833° zenith (refraction plus solar disk radius). Results are
//! accurate to a few minutes, which is plenty for day/night icon selection and
//! sunrise/sunset displays.

use std::cmp::Ordering;
use std::f64::consts::TAU;
use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::clock::Clock;
use crate::error::SolarError;

const ZENITH_DEG: f64 = 90.833;
const DECLINATION_AMPLITUDE_RAD: f64 = 0.4095;
const DAYS_PER_YEAR: f64 = 365.0;

/// Whole-day sun conditions above the polar circles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolarCondition {
    /// Sun never sets.
    Day,
    /// Sun never rises.
    Night,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SunTimes {
    pub sunrise: DateTime<Tz>,
    pub sunset: DateTime<Tz>,
    pub solar_noon: DateTime<Tz>,
    pub day_length: Duration,
    pub polar: Option<PolarCondition>,
}

impl SunTimes {
    pub fn is_daylight_at(&self, instant: DateTime<Utc>) -> bool {
        self.sunrise <= instant && instant < self.sunset
    }

    pub fn is_currently_daylight(&self, clock: &impl Clock) -> bool {
        self.is_daylight_at(clock.now())
    }
}

/// A date, a point on the globe and the zone results are rendered in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTimeQuery {
    pub date: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
    pub zone: Tz,
}

impl GeoTimeQuery {
    pub fn new(date: NaiveDate, latitude: f64, longitude: f64, zone: Tz) -> Self {
        Self { date, latitude, longitude, zone }
    }

    pub fn compute(&self) -> Result<SunTimes, SolarError> {
        compute_sun_times(self.date, self.latitude, self.longitude, self.zone)
    }
}

/// Compute sunrise/sunset/day length for `date` at the given coordinates.
///
/// Coordinates are validated rather than clamped: non-finite or out-of-range
/// values yield [`SolarError::InvalidInput`].
pub fn compute_sun_times(
    date: NaiveDate,
    latitude: f64,
    longitude: f64,
    zone: Tz,
) -> Result<SunTimes, SolarError> {
    validate_coordinates(latitude, longitude)?;

    let n = f64::from(date.ordinal());
    let declination = DECLINATION_AMPLITUDE_RAD * (TAU / DAYS_PER_YEAR * (n - 80.0)).sin();
    let eot_minutes = equation_of_time(n);

    let lat = latitude.to_radians();
    let cos_h = (ZENITH_DEG.to_radians().cos() - lat.sin() * declination.sin())
        / (lat.cos() * declination.cos());

    if cos_h < -1.0 {
        let midnight = start_of_day(date, zone)?;
        return Ok(SunTimes {
            sunrise: midnight,
            sunset: midnight + Duration::hours(24),
            solar_noon: midnight + Duration::hours(12),
            day_length: Duration::hours(24),
            polar: Some(PolarCondition::Day),
        });
    }
    if cos_h > 1.0 {
        let midnight = start_of_day(date, zone)?;
        return Ok(SunTimes {
            sunrise: midnight,
            sunset: midnight,
            solar_noon: midnight + Duration::hours(12),
            day_length: Duration::zero(),
            polar: Some(PolarCondition::Night),
        });
    }

    let hour_angle_deg = cos_h.acos().to_degrees();
    let noon_ut = 12.0 - longitude / 15.0 - eot_minutes / 60.0;

    // Only sunrise is pinned to the query date; noon and sunset follow it, so a
    // sunset past local midnight stays after sunrise.
    let sunrise = anchor_to_date(date, zone, noon_ut - hour_angle_deg / 15.0)?;
    let half_day = hours(hour_angle_deg / 15.0);
    let solar_noon = sunrise + half_day;
    let sunset = solar_noon + half_day;
    let day_length = sunset - sunrise;

    Ok(SunTimes { sunrise, sunset, solar_noon, day_length, polar: None })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SunEventKind {
    Sunrise,
    Sunset,
    Unknown,
}

impl SunEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SunEventKind::Sunrise => "Sunrise",
            SunEventKind::Sunset => "Sunset",
            SunEventKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for SunEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The upcoming sunrise or sunset and whether it is daylight until then.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextSunEvent {
    pub kind: SunEventKind,
    pub at: DateTime<Utc>,
    pub is_daylight: bool,
}

/// Find the next sunrise or sunset after the clock's "now".
///
/// Never fails: if the calculation errors, the result is `Unknown` at "now"
/// with no daylight, and a warning is logged.
pub fn next_sun_event(latitude: f64, longitude: f64, zone: Tz, clock: &impl Clock) -> NextSunEvent {
    let now = clock.now();

    match try_next_sun_event(latitude, longitude, zone, now) {
        Ok(event) => event,
        Err(err) => {
            warn!(%err, latitude, longitude, zone = zone.name(), "sun event unavailable, reporting unknown");
            NextSunEvent { kind: SunEventKind::Unknown, at: now, is_daylight: false }
        }
    }
}

fn try_next_sun_event(
    latitude: f64,
    longitude: f64,
    zone: Tz,
    now: DateTime<Utc>,
) -> Result<NextSunEvent, SolarError> {
    let today = now.with_timezone(&zone).date_naive();
    let times = compute_sun_times(today, latitude, longitude, zone)?;

    if now < times.sunrise {
        let yesterday = today.pred_opt().ok_or_else(|| unresolvable(today, zone))?;
        let previous = compute_sun_times(yesterday, latitude, longitude, zone)?;
        if now < previous.sunset {
            return Ok(NextSunEvent {
                kind: SunEventKind::Sunset,
                at: previous.sunset.with_timezone(&Utc),
                is_daylight: true,
            });
        }

        return Ok(NextSunEvent {
            kind: SunEventKind::Sunrise,
            at: times.sunrise.with_timezone(&Utc),
            is_daylight: false,
        });
    }
    if now < times.sunset {
        return Ok(NextSunEvent {
            kind: SunEventKind::Sunset,
            at: times.sunset.with_timezone(&Utc),
            is_daylight: true,
        });
    }

    let tomorrow = today.succ_opt().ok_or_else(|| unresolvable(today, zone))?;
    let next = compute_sun_times(tomorrow, latitude, longitude, zone)?;

    Ok(NextSunEvent {
        kind: SunEventKind::Sunrise,
        at: next.sunrise.with_timezone(&Utc),
        is_daylight: false,
    })
}

fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), SolarError> {
    let valid = latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude);

    if valid {
        Ok(())
    } else {
        Err(SolarError::InvalidInput { latitude, longitude })
    }
}

/// Equation of time in minutes for day-of-year `n`.
fn equation_of_time(n: f64) -> f64 {
    let b = TAU * (n - 81.0) / DAYS_PER_YEAR;
    9.87 * (2.0 * b).sin() - 7.53 * b.cos() - 1.5 * b.sin()
}

/// First valid local instant of `date` in `zone`.
fn start_of_day(date: NaiveDate, zone: Tz) -> Result<DateTime<Tz>, SolarError> {
    // A few zones skip midnight on DST day; take the first hour that exists.
    (0..3)
        .find_map(|hour| {
            let local = date.and_hms_opt(hour, 0, 0)?;
            zone.from_local_datetime(&local).earliest()
        })
        .ok_or_else(|| unresolvable(date, zone))
}

/// Turn decimal UT hours on `date` into an instant whose civil date in `zone`
/// is `date`, shifting by whole days when the hour value falls outside the day.
fn anchor_to_date(date: NaiveDate, zone: Tz, ut_hours: f64) -> Result<DateTime<Tz>, SolarError> {
    if !ut_hours.is_finite() {
        return Err(unresolvable(date, zone));
    }

    let utc_midnight = date.and_time(NaiveTime::MIN).and_utc();
    let mut instant = (utc_midnight + hours(ut_hours)).with_timezone(&zone);

    for _ in 0..4 {
        match instant.date_naive().cmp(&date) {
            Ordering::Equal => return Ok(instant),
            Ordering::Less => instant += Duration::days(1),
            Ordering::Greater => instant -= Duration::days(1),
        }
    }

    Err(unresolvable(date, zone))
}

fn hours(value: f64) -> Duration {
    Duration::milliseconds((value * 3_600_000.0).round() as i64)
}

fn unresolvable(date: NaiveDate, zone: Tz) -> SolarError {
    SolarError::UnresolvableLocalTime { date, zone: zone.name().to_string() }
}
