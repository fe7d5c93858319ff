//! Station payload shape, as far as timestamps are concerned.
//!
//! Every measured quantity arrives as `{ "time": ..., "unit": ..., "value": ... }`
//! inside a sensor group. Groups for sensors the station doesn't have are
//! simply absent.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Anything that can enumerate the raw timestamp tokens it carries.
pub trait TimestampSource {
    fn all_timestamps(&self) -> Vec<String>;
}

impl<T: TimestampSource> TimestampSource for Option<T> {
    fn all_timestamps(&self) -> Vec<String> {
        self.as_ref().map(TimestampSource::all_timestamps).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Measurement {
    pub time: String,
    pub unit: String,
    pub value: String,
}

impl Measurement {
    pub fn new(time: impl Into<String>, unit: impl Into<String>, value: impl Into<String>) -> Self {
        Self { time: time.into(), unit: unit.into(), value: value.into() }
    }
}

impl TimestampSource for Measurement {
    fn all_timestamps(&self) -> Vec<String> {
        vec![self.time.clone()]
    }
}

fn times(fields: &[&Option<Measurement>]) -> Vec<String> {
    fields.iter().filter_map(|m| m.as_ref()).map(|m| m.time.clone()).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutdoorGroup {
    pub temperature: Option<Measurement>,
    pub feels_like: Option<Measurement>,
    pub app_temp: Option<Measurement>,
    pub dew_point: Option<Measurement>,
    pub humidity: Option<Measurement>,
}

impl TimestampSource for OutdoorGroup {
    fn all_timestamps(&self) -> Vec<String> {
        times(&[&self.temperature, &self.feels_like, &self.app_temp, &self.dew_point, &self.humidity])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndoorGroup {
    pub temperature: Option<Measurement>,
    pub humidity: Option<Measurement>,
}

impl TimestampSource for IndoorGroup {
    fn all_timestamps(&self) -> Vec<String> {
        times(&[&self.temperature, &self.humidity])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolarUviGroup {
    pub solar: Option<Measurement>,
    pub uvi: Option<Measurement>,
}

impl TimestampSource for SolarUviGroup {
    fn all_timestamps(&self) -> Vec<String> {
        times(&[&self.solar, &self.uvi])
    }
}

/// Rain totals; used for both the traditional tipping bucket and the piezo gauge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RainfallGroup {
    pub rain_rate: Option<Measurement>,
    pub daily: Option<Measurement>,
    pub event: Option<Measurement>,
    #[serde(alias = "1_hour")]
    pub hourly: Option<Measurement>,
    pub weekly: Option<Measurement>,
    pub monthly: Option<Measurement>,
    pub yearly: Option<Measurement>,
}

impl TimestampSource for RainfallGroup {
    fn all_timestamps(&self) -> Vec<String> {
        times(&[
            &self.rain_rate,
            &self.daily,
            &self.event,
            &self.hourly,
            &self.weekly,
            &self.monthly,
            &self.yearly,
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindGroup {
    pub wind_speed: Option<Measurement>,
    pub wind_gust: Option<Measurement>,
    pub wind_direction: Option<Measurement>,
}

impl TimestampSource for WindGroup {
    fn all_timestamps(&self) -> Vec<String> {
        times(&[&self.wind_speed, &self.wind_gust, &self.wind_direction])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressureGroup {
    pub relative: Option<Measurement>,
    pub absolute: Option<Measurement>,
}

impl TimestampSource for PressureGroup {
    fn all_timestamps(&self) -> Vec<String> {
        times(&[&self.relative, &self.absolute])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightningGroup {
    pub distance: Option<Measurement>,
    pub count: Option<Measurement>,
}

impl TimestampSource for LightningGroup {
    fn all_timestamps(&self) -> Vec<String> {
        times(&[&self.distance, &self.count])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pm25Channel {
    pub real_time_aqi: Option<Measurement>,
    pub pm25: Option<Measurement>,
    #[serde(rename = "24_hours_aqi")]
    pub aqi_24h: Option<Measurement>,
}

impl TimestampSource for Pm25Channel {
    fn all_timestamps(&self) -> Vec<String> {
        times(&[&self.real_time_aqi, &self.pm25, &self.aqi_24h])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempHumidityChannel {
    pub temperature: Option<Measurement>,
    pub humidity: Option<Measurement>,
}

impl TimestampSource for TempHumidityChannel {
    fn all_timestamps(&self) -> Vec<String> {
        times(&[&self.temperature, &self.humidity])
    }
}

/// Battery levels keyed by sensor name; the set varies by station hardware.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatteryGroup {
    pub sensors: BTreeMap<String, Measurement>,
}

impl TimestampSource for BatteryGroup {
    fn all_timestamps(&self) -> Vec<String> {
        self.sensors.values().flat_map(TimestampSource::all_timestamps).collect()
    }
}

/// The full set of sensor groups a station reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherPayload {
    pub outdoor: Option<OutdoorGroup>,
    pub indoor: Option<IndoorGroup>,
    pub solar_and_uvi: Option<SolarUviGroup>,
    pub rainfall: Option<RainfallGroup>,
    pub rainfall_piezo: Option<RainfallGroup>,
    pub wind: Option<WindGroup>,
    pub pressure: Option<PressureGroup>,
    pub lightning: Option<LightningGroup>,
    pub pm25_ch1: Option<Pm25Channel>,
    pub pm25_ch2: Option<Pm25Channel>,
    pub pm25_ch3: Option<Pm25Channel>,
    pub temp_and_humidity_ch1: Option<TempHumidityChannel>,
    pub temp_and_humidity_ch2: Option<TempHumidityChannel>,
    pub temp_and_humidity_ch3: Option<TempHumidityChannel>,
    pub battery: Option<BatteryGroup>,
}

impl TimestampSource for WeatherPayload {
    fn all_timestamps(&self) -> Vec<String> {
        let groups: [&dyn TimestampSource; 15] = [
            &self.outdoor,
            &self.indoor,
            &self.solar_and_uvi,
            &self.rainfall,
            &self.rainfall_piezo,
            &self.wind,
            &self.pressure,
            &self.lightning,
            &self.pm25_ch1,
            &self.pm25_ch2,
            &self.pm25_ch3,
            &self.temp_and_humidity_ch1,
            &self.temp_and_humidity_ch2,
            &self.temp_and_humidity_ch3,
            &self.battery,
        ];

        groups.iter().flat_map(|g| g.all_timestamps()).collect()
    }
}

/// API response envelope wrapping a payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StationResponse {
    pub code: i64,
    pub msg: String,
    /// When the API answered; not a sensor reading time.
    pub time: String,
    pub data: WeatherPayload,
}

impl WeatherPayload {
    /// Parse either a bare payload or one wrapped in a [`StationResponse`].
    pub fn from_json(body: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(body).context("Failed to parse station payload JSON")?;

        if value.get("data").is_some_and(serde_json::Value::is_object) {
            let envelope: StationResponse =
                serde_json::from_value(value).context("Failed to parse station response envelope")?;
            return Ok(envelope.data);
        }

        serde_json::from_value(value).context("Failed to parse station payload")
    }
}
