//! Turning per-sensor timestamp strings into one "data recorded at" instant.
//!
//! Stations report one time per measured quantity, as epoch seconds, epoch
//! milliseconds, or a formatted date string, and individual fields are often
//! blank, zero, or in the wrong unit. [`TimestampNormalizer`] parses what it can
//! and reports the most recent plausible reading.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::TimestampError;
use crate::payload::TimestampSource;

/// Epoch values above this are treated as milliseconds on retry.
pub const MILLISECOND_THRESHOLD: f64 = 1_000_000_000_000.0;

/// No station data predates this year.
pub const EARLIEST_PLAUSIBLE_YEAR: i32 = 2020;

/// Length of the "year" used by the manual year-offset correction.
pub const SECONDS_PER_YEAR: i64 = 31_536_000;

/// How stale the synthetic timestamp is when nothing in a payload parses.
pub const FALLBACK_AGE_SECS: i64 = 30;

/// Zone-less layouts, read as UTC. Tried in order; the US layout deliberately
/// wins over the European one for inputs valid in both.
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// What to do with a numeric token that is implausible as both seconds and
/// milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    /// Report [`TimestampError::OutOfRange`].
    #[default]
    Reject,
    /// Pretend the reading happened "now".
    SubstituteNow,
}

#[derive(Debug, Clone)]
pub struct TimestampNormalizer<C = SystemClock> {
    clock: C,
    policy: OutOfRangePolicy,
    year_offset: Option<i32>,
}

impl TimestampNormalizer<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for TimestampNormalizer<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> TimestampNormalizer<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock, policy: OutOfRangePolicy::default(), year_offset: None }
    }

    pub fn with_policy(mut self, policy: OutOfRangePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Apply [`correct`](Self::correct) with this offset to every token
    /// seen by [`most_recent`](Self::most_recent).
    pub fn with_year_offset(mut self, offset_years: Option<i32>) -> Self {
        self.year_offset = offset_years;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Parse one raw token.
    ///
    /// `""` and any spelling of zero mean "no data". Numeric tokens are epoch seconds, retried
    /// as milliseconds when too large; either way the year must fall between
    /// 2020 and next year. Anything else is matched against the known date
    /// layouts as UTC.
    pub fn parse(&self, token: &str) -> Result<DateTime<Utc>, TimestampError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TimestampError::Empty);
        }

        if let Some(value) = parse_epoch(token) {
            if value == 0.0 {
                return Err(TimestampError::Empty);
            }
            return self.resolve_epoch(value);
        }

        parse_layouts(token).ok_or_else(|| TimestampError::Unrecognized(token.to_string()))
    }

    /// Parse a token from a station known to report a year that is off by
    /// `offset_years`. Falls back to [`parse`](Self::parse) when the shifted
    /// value still isn't plausible.
    pub fn correct(&self, token: &str, offset_years: i32) -> Result<DateTime<Utc>, TimestampError> {
        if let Some(value) = parse_epoch(token.trim()) {
            let corrected = value - f64::from(offset_years) * SECONDS_PER_YEAR as f64;
            if let Some(at) = plausible_epoch(corrected, self.clock.now()) {
                return Ok(at);
            }
        }

        self.parse(token)
    }

    /// Most recent valid instant among all of `source`'s tokens, if any.
    pub fn most_recent<S: TimestampSource + ?Sized>(&self, source: &S) -> Option<DateTime<Utc>> {
        self.most_recent_of(&source.all_timestamps())
    }

    /// Like [`most_recent`](Self::most_recent), but never empty-handed: when
    /// not a single token parses, returns "now" minus thirty seconds and logs a
    /// warning, since that points at an upstream format change.
    pub fn extract_most_recent_timestamp<S: TimestampSource + ?Sized>(&self, source: &S) -> DateTime<Utc> {
        let tokens = source.all_timestamps();

        self.most_recent_of(&tokens).unwrap_or_else(|| {
            warn!(tokens = tokens.len(), "no valid timestamp in station payload, using fallback");
            self.clock.now() - Duration::seconds(FALLBACK_AGE_SECS)
        })
    }

    pub fn age_label(&self, recorded: DateTime<Utc>) -> String {
        format_data_age(recorded, self.clock.now())
    }

    pub fn is_fresh(&self, recorded: DateTime<Utc>, window: Duration) -> bool {
        is_data_fresh(recorded, window, self.clock.now())
    }

    fn most_recent_of(&self, tokens: &[String]) -> Option<DateTime<Utc>> {
        let parsed: BTreeSet<DateTime<Utc>> = tokens
            .iter()
            .filter_map(|token| match self.parse_token(token) {
                Ok(at) => Some(at),
                Err(err) => {
                    debug!(token = token.as_str(), %err, "skipping timestamp");
                    None
                }
            })
            .collect();

        parsed.last().copied()
    }

    fn parse_token(&self, token: &str) -> Result<DateTime<Utc>, TimestampError> {
        match self.year_offset {
            Some(offset) => self.correct(token, offset),
            None => self.parse(token),
        }
    }

    fn resolve_epoch(&self, value: f64) -> Result<DateTime<Utc>, TimestampError> {
        let now = self.clock.now();

        let plausible = plausible_epoch(value, now).or_else(|| {
            (value > MILLISECOND_THRESHOLD)
                .then(|| plausible_epoch(value / 1000.0, now))
                .flatten()
        });
        if let Some(at) = plausible {
            return Ok(at);
        }

        match self.policy {
            OutOfRangePolicy::Reject => Err(TimestampError::OutOfRange { value }),
            OutOfRangePolicy::SubstituteNow => {
                debug!(value, "implausible epoch value, substituting now");
                Ok(now)
            }
        }
    }
}

/// Human-readable age: "45s ago", "3m ago", "2h ago", "1d ago".
///
/// Instants in the future count as zero seconds old.
pub fn format_data_age(recorded: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - recorded).num_seconds().max(0);

    match secs {
        s if s < 60 => format!("{s}s ago"),
        s if s < 3_600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3_600),
        s => format!("{}d ago", s / 86_400),
    }
}

/// True when `recorded` is strictly less than `window` old.
pub fn is_data_fresh(recorded: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> bool {
    now - recorded < window
}

fn parse_epoch(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn plausible_epoch(seconds: f64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    // `as` saturates, and out-of-range millis come back as None.
    let at = DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64)?;
    (EARLIEST_PLAUSIBLE_YEAR..=now.year() + 1).contains(&at.year()).then_some(at)
}

fn parse_layouts(token: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(token) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(at) = DateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(at.with_timezone(&Utc));
    }

    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(token, layout).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::payload::{Measurement, OutdoorGroup, WeatherPayload, WindGroup};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    fn normalizer() -> TimestampNormalizer<FixedClock> {
        TimestampNormalizer::with_clock(FixedClock(now()))
    }

    fn payload(outdoor: [&str; 3], wind: [&str; 2]) -> WeatherPayload {
        let m = |t: &str| Some(Measurement::new(t, "", "0"));
        WeatherPayload {
            outdoor: Some(OutdoorGroup {
                temperature: m(outdoor[0]),
                dew_point: m(outdoor[1]),
                humidity: m(outdoor[2]),
                ..Default::default()
            }),
            wind: Some(WindGroup { wind_speed: m(wind[0]), wind_gust: m(wind[1]), ..Default::default() }),
            ..Default::default()
        }
    }

    #[test]
    fn empty_and_zero_are_no_data() {
        let n = normalizer();
        assert_eq!(n.parse(""), Err(TimestampError::Empty));
        assert_eq!(n.parse("0"), Err(TimestampError::Empty));
        assert_eq!(n.parse("   "), Err(TimestampError::Empty));
        assert_eq!(n.parse("0.0"), Err(TimestampError::Empty));
        assert_eq!(n.parse("00"), Err(TimestampError::Empty));
        assert_eq!(n.correct("0.0", 3), Err(TimestampError::Empty));
    }

    #[test]
    fn parses_epoch_seconds() {
        let expected = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(normalizer().parse("1700000000"), Ok(expected));
    }

    #[test]
    fn epoch_milliseconds_are_recognised() {
        let expected = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(normalizer().parse("1700000000000"), Ok(expected));
    }

    #[test]
    fn implausible_epoch_is_rejected_by_default() {
        let n = normalizer();
        assert!(matches!(n.parse("99"), Err(TimestampError::OutOfRange { .. })));
        // 2100-01-01 in seconds: too far ahead, and too small to be millis.
        assert!(matches!(n.parse("4102444800"), Err(TimestampError::OutOfRange { .. })));
    }

    #[test]
    fn implausible_epoch_can_substitute_now() {
        let n = normalizer().with_policy(OutOfRangePolicy::SubstituteNow);
        assert_eq!(n.parse("99"), Ok(now()));
    }

    #[test]
    fn parses_formatted_layouts_as_utc() {
        let n = normalizer();
        let expected = Utc.with_ymd_and_hms(2023, 10, 26, 14, 30, 25).unwrap();

        assert_eq!(n.parse("2023-10-26 14:30:25"), Ok(expected));
        assert_eq!(n.parse("2023-10-26T14:30:25"), Ok(expected));
        assert_eq!(n.parse("2023-10-26T14:30:25Z"), Ok(expected));
        assert_eq!(n.parse("2023-10-26T16:30:25+02:00"), Ok(expected));
        assert_eq!(n.parse("10/26/2023 14:30:25"), Ok(expected));
        assert_eq!(n.parse("26/10/2023 14:30:25"), Ok(expected));
    }

    #[test]
    fn us_layout_wins_when_ambiguous() {
        let expected = Utc.with_ymd_and_hms(2023, 3, 4, 10, 0, 0).unwrap();
        assert_eq!(normalizer().parse("03/04/2023 10:00:00"), Ok(expected));
    }

    #[test]
    fn unknown_text_is_unrecognized() {
        assert_eq!(
            normalizer().parse("yesterday"),
            Err(TimestampError::Unrecognized("yesterday".to_string()))
        );
        assert!(normalizer().parse("NaN").is_err());
    }

    #[test]
    fn year_offset_correction() {
        let n = normalizer();
        let shifted = (1_700_000_000 + 10 * SECONDS_PER_YEAR).to_string();

        assert_eq!(n.correct(&shifted, 10), Ok(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        // Wrong offset: still implausible, so the standard parse decides.
        assert!(matches!(n.correct(&shifted, 1), Err(TimestampError::OutOfRange { .. })));
        // Non-numeric tokens go straight to the standard parse.
        assert_eq!(
            n.correct("2023-10-26 14:30:25", 10),
            Ok(Utc.with_ymd_and_hms(2023, 10, 26, 14, 30, 25).unwrap())
        );
    }

    #[test]
    fn most_recent_picks_latest_valid() {
        let p = payload(["1700000000", "1700000300", "1700000300"], ["1700000100000", "junk"]);
        let expected = Utc.timestamp_opt(1_700_000_300, 0).unwrap();

        assert_eq!(normalizer().most_recent(&p), Some(expected));
        assert_eq!(normalizer().extract_most_recent_timestamp(&p), expected);
    }

    #[test]
    fn single_valid_token_among_garbage() {
        let p = payload(["0", "", "garbage"], ["99", "2023-10-26 14:30:25"]);
        let expected = Utc.with_ymd_and_hms(2023, 10, 26, 14, 30, 25).unwrap();

        assert_eq!(normalizer().extract_most_recent_timestamp(&p), expected);
    }

    #[test]
    fn all_zero_payload_falls_back_near_now() {
        let p = payload(["0", "0", "0"], ["0", "0"]);
        let n = normalizer();

        assert_eq!(n.most_recent(&p), None);
        let fallback = n.extract_most_recent_timestamp(&p);
        assert_eq!(now() - fallback, Duration::seconds(30));
    }

    #[test]
    fn empty_payload_falls_back_too() {
        let fallback = normalizer().extract_most_recent_timestamp(&WeatherPayload::default());
        assert_eq!(fallback, now() - Duration::seconds(30));
    }

    #[test]
    fn station_year_offset_applies_to_every_token() {
        let shifted = (1_700_000_000 + 10 * SECONDS_PER_YEAR).to_string();
        let p = payload([shifted.as_str(), "0", ""], ["0", "0"]);
        let n = normalizer().with_year_offset(Some(10));

        assert_eq!(n.most_recent(&p), Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
    }

    #[test]
    fn age_buckets() {
        let now = now();
        assert_eq!(format_data_age(now - Duration::seconds(45), now), "45s ago");
        assert_eq!(format_data_age(now - Duration::seconds(200), now), "3m ago");
        assert_eq!(format_data_age(now - Duration::seconds(7_500), now), "2h ago");
        assert_eq!(format_data_age(now - Duration::seconds(90_000), now), "1d ago");
        assert_eq!(format_data_age(now + Duration::seconds(10), now), "0s ago");
        assert_eq!(normalizer().age_label(now - Duration::seconds(59)), "59s ago");
    }

    #[test]
    fn freshness_is_strict() {
        let now = now();
        let window = Duration::seconds(120);

        assert!(is_data_fresh(now - Duration::seconds(119), window, now));
        assert!(!is_data_fresh(now - Duration::seconds(120), window, now));
        assert!(!is_data_fresh(now - Duration::seconds(121), window, now));
        assert!(normalizer().is_fresh(now - Duration::seconds(5), window));
    }
}
