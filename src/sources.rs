//! Source adapters for the two external providers.
//!
//! The pollution provider answers one "latest reading in window" query per
//! day; the weather provider answers one dense daily-array query for a whole
//! date range. Each adapter normalizes its provider payload into the
//! provider-agnostic records in [`crate::models`] and never lets a transport
//! or decode failure escape as anything but
//! [`PipelineError::Unavailable`], so callers skip and continue rather than
//! abort a whole sequence.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{PollutionSnapshot, WeatherDailySlice};

// ---

/// Daily fields requested from the weather provider, in array order.
const DAILY_FIELDS: [&str; 4] = [
    "temperature_2m_max",
    "temperature_2m_min",
    "precipitation_sum",
    "windspeed_10m_max",
];

/// Half-open epoch-second window covering one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: i64,
    pub end: i64,
}

impl DayWindow {
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

/// Inclusive calendar-day range for one weather fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Number of days covered, counting both endpoints.
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

// ---

/// A provider of single "latest reading in window" pollution snapshots.
#[async_trait]
pub trait PollutionSource: Send + Sync {
    async fn fetch_pollution(
        &self,
        lat: f64,
        lon: f64,
        window: DayWindow,
    ) -> PipelineResult<PollutionSnapshot>;
}

/// A provider of dense per-day weather slices for a whole range.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_weather(
        &self,
        lat: f64,
        lon: f64,
        range: DateRange,
    ) -> PipelineResult<Vec<WeatherDailySlice>>;
}

// ---

/// Which pollution endpoint a client instance talks to. All three share one
/// response shape (`{coord, list: [...]}`).
#[derive(Debug, Clone, Copy)]
pub enum PollutionEndpoint {
    Current,
    History,
    Forecast,
}

/// HTTP client for the air-pollution provider.
pub struct PollutionApi {
    // ---
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    endpoint: PollutionEndpoint,
}

impl PollutionApi {
    // ---
    pub fn new(config: &Config, endpoint: PollutionEndpoint) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.pollution_api_url.clone(),
            api_key: config.open_weather_api_key.clone(),
            endpoint,
        }
    }

    fn url(&self) -> String {
        // ---
        match self.endpoint {
            PollutionEndpoint::Current => self.base_url.clone(),
            PollutionEndpoint::History => format!("{}/history", self.base_url),
            PollutionEndpoint::Forecast => format!("{}/forecast", self.base_url),
        }
    }
}

#[async_trait]
impl PollutionSource for PollutionApi {
    async fn fetch_pollution(
        &self,
        lat: f64,
        lon: f64,
        window: DayWindow,
    ) -> PipelineResult<PollutionSnapshot> {
        // ---
        let mut query = vec![
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("appid", self.api_key.clone()),
        ];
        // Only the history endpoint takes an explicit window; the current and
        // forecast endpoints are filtered client-side below.
        if matches!(self.endpoint, PollutionEndpoint::History) {
            query.push(("start", window.start.to_string()));
            query.push(("end", window.end.to_string()));
        }

        let url = self.url();
        debug!("Fetching pollution data from {url} for window {window:?}");

        let payload: Value = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| PipelineError::unavailable("pollution", e.to_string()))?
            .json()
            .await
            .map_err(|e| PipelineError::unavailable("pollution", e.to_string()))?;

        parse_pollution_payload(&payload, window, lat, lon)
    }
}

/// Pick the first reading inside `window` out of a `{coord, list}` payload
/// and normalize it. An empty or fully out-of-window list is `Unavailable`.
pub fn parse_pollution_payload(
    payload: &Value,
    window: DayWindow,
    lat: f64,
    lon: f64,
) -> PipelineResult<PollutionSnapshot> {
    // ---
    let readings = payload
        .get("list")
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::unavailable("pollution", "response has no 'list' array"))?;

    let entry = readings
        .iter()
        .find(|r| {
            r.get("dt")
                .and_then(Value::as_i64)
                .is_some_and(|dt| window.contains(dt))
        })
        .ok_or_else(|| {
            PipelineError::unavailable(
                "pollution",
                format!(
                    "no reading in window {}..{} ({} readings returned)",
                    window.start,
                    window.end,
                    readings.len()
                ),
            )
        })?;

    // `find` guarantees dt is present and integral.
    let timestamp = entry.get("dt").and_then(Value::as_i64).unwrap_or_default();

    let coord = payload.get("coord");
    let coord_f64 = |key: &str, fallback: f64| {
        coord
            .and_then(|c| c.get(key))
            .and_then(Value::as_f64)
            .unwrap_or(fallback)
    };

    Ok(PollutionSnapshot {
        timestamp,
        aqi: entry
            .get("main")
            .and_then(|m| m.get("aqi"))
            .cloned()
            .unwrap_or(Value::Null),
        components: entry
            .get("components")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
        latitude: coord_f64("lat", lat),
        longitude: coord_f64("lon", lon),
    })
}

// ---

/// Which weather endpoint a client instance talks to.
#[derive(Debug, Clone, Copy)]
pub enum WeatherEndpoint {
    Forecast,
    Archive,
}

/// HTTP client for the weather provider's daily aggregates.
pub struct WeatherApi {
    // ---
    client: reqwest::Client,
    base_url: String,
}

impl WeatherApi {
    // ---
    pub fn new(config: &Config, endpoint: WeatherEndpoint) -> Self {
        let base_url = match endpoint {
            WeatherEndpoint::Forecast => config.weather_forecast_url.clone(),
            WeatherEndpoint::Archive => config.weather_archive_url.clone(),
        };
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl WeatherSource for WeatherApi {
    async fn fetch_weather(
        &self,
        lat: f64,
        lon: f64,
        range: DateRange,
    ) -> PipelineResult<Vec<WeatherDailySlice>> {
        // ---
        debug!(
            "Fetching weather data from {} for {}..{}",
            self.base_url, range.start, range.end
        );

        let payload: Value = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("start_date", range.start.format("%Y-%m-%d").to_string()),
                ("end_date", range.end.format("%Y-%m-%d").to_string()),
                ("daily", DAILY_FIELDS.join(",")),
                // Daily aggregates must align with the UTC-derived date parts.
                ("timezone", "UTC".to_string()),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| PipelineError::unavailable("weather", e.to_string()))?
            .json()
            .await
            .map_err(|e| PipelineError::unavailable("weather", e.to_string()))?;

        parse_weather_payload(&payload)
    }
}

/// Zip the provider's parallel daily arrays into per-day slices. One slice
/// per entry of the `time` array; a parallel array shorter than `time`
/// yields null fields for the missing days, which fail coercion row-by-row
/// instead of shifting neighbors.
pub fn parse_weather_payload(payload: &Value) -> PipelineResult<Vec<WeatherDailySlice>> {
    // ---
    let daily = payload
        .get("daily")
        .ok_or_else(|| PipelineError::unavailable("weather", "response has no 'daily' object"))?;

    let days = daily
        .get("time")
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::unavailable("weather", "daily object has no 'time' array"))?
        .len();

    let field = |name: &str, index: usize| {
        daily
            .get(name)
            .and_then(Value::as_array)
            .and_then(|arr| arr.get(index))
            .cloned()
            .unwrap_or(Value::Null)
    };

    Ok((0..days)
        .map(|i| WeatherDailySlice {
            max_temp: field("temperature_2m_max", i),
            min_temp: field("temperature_2m_min", i),
            precipitation: field("precipitation_sum", i),
            max_wind_speed: field("windspeed_10m_max", i),
        })
        .collect())
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn window(start: i64, end: i64) -> DayWindow {
        DayWindow { start, end }
    }

    #[test]
    fn picks_first_reading_inside_the_window() {
        // ---
        let payload = json!({
            "coord": { "lat": 24.8607, "lon": 67.0011 },
            "list": [
                { "dt": 100, "main": { "aqi": 2 }, "components": { "co": 190.0 } },
                { "dt": 250, "main": { "aqi": 3 }, "components": { "co": 201.9 } },
                { "dt": 300, "main": { "aqi": 4 }, "components": { "co": 230.0 } },
            ]
        });

        let snapshot = parse_pollution_payload(&payload, window(200, 400), 0.0, 0.0).unwrap();
        assert_eq!(snapshot.timestamp, 250);
        assert_eq!(snapshot.aqi, json!(3));
        assert_eq!(snapshot.latitude, 24.8607);
        assert_eq!(snapshot.components.get("co"), Some(&json!(201.9)));
    }

    #[test]
    fn empty_or_out_of_window_list_is_unavailable() {
        // ---
        let empty = json!({ "coord": {}, "list": [] });
        assert!(matches!(
            parse_pollution_payload(&empty, window(0, 100), 0.0, 0.0),
            Err(PipelineError::Unavailable { .. })
        ));

        let out_of_window = json!({ "list": [ { "dt": 500, "main": { "aqi": 1 } } ] });
        assert!(matches!(
            parse_pollution_payload(&out_of_window, window(0, 100), 0.0, 0.0),
            Err(PipelineError::Unavailable { .. })
        ));

        let no_list = json!({ "message": "rate limited" });
        assert!(matches!(
            parse_pollution_payload(&no_list, window(0, 100), 0.0, 0.0),
            Err(PipelineError::Unavailable { .. })
        ));
    }

    #[test]
    fn missing_coord_falls_back_to_requested_location() {
        // ---
        let payload = json!({ "list": [ { "dt": 50, "main": { "aqi": 2 }, "components": {} } ] });
        let snapshot = parse_pollution_payload(&payload, window(0, 100), 24.0, 67.0).unwrap();
        assert_eq!(snapshot.latitude, 24.0);
        assert_eq!(snapshot.longitude, 67.0);
    }

    #[test]
    fn zips_parallel_daily_arrays() {
        // ---
        let payload = json!({
            "daily": {
                "time": ["2025-03-24", "2025-03-25", "2025-03-26"],
                "temperature_2m_max": [30.1, 31.0, 29.5],
                "temperature_2m_min": [21.0, 22.4, 20.9],
                "precipitation_sum": [0.0, null, 2.5],
                "windspeed_10m_max": [12.0, 14.4, 9.8],
            }
        });

        let slices = parse_weather_payload(&payload).unwrap();
        assert_eq!(slices.len(), 3);
        assert_eq!(slices[1].max_temp, json!(31.0));
        assert_eq!(slices[1].precipitation, Value::Null);
        assert_eq!(slices[2].max_wind_speed, json!(9.8));
    }

    #[test]
    fn short_parallel_array_yields_nulls_not_shifts() {
        // ---
        let payload = json!({
            "daily": {
                "time": ["2025-03-24", "2025-03-25"],
                "temperature_2m_max": [30.1],
                "temperature_2m_min": [21.0, 22.4],
                "precipitation_sum": [0.0, 0.0],
                "windspeed_10m_max": [12.0, 14.4],
            }
        });

        let slices = parse_weather_payload(&payload).unwrap();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].max_temp, json!(30.1));
        assert_eq!(slices[1].max_temp, Value::Null);
        assert_eq!(slices[1].min_temp, json!(22.4));
    }

    #[test]
    fn missing_daily_object_is_unavailable() {
        // ---
        let payload = json!({ "error": true });
        assert!(matches!(
            parse_weather_payload(&payload),
            Err(PipelineError::Unavailable { .. })
        ));
    }

    #[test]
    fn date_range_len_counts_both_endpoints() {
        // ---
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 3, 26).unwrap(),
        };
        assert_eq!(range.len_days(), 7);
    }
}
