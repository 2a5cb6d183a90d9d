//! Data models for the AQI pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---

/// The eight pollutant concentrations reported by the pollution provider.
/// A provider payload may omit any of them; absent keys default to 0.
pub const POLLUTANTS: [&str; 8] = ["co", "no", "no2", "o3", "so2", "pm2_5", "pm10", "nh3"];

/// Identifier columns dropped before training and scoring.
pub const DROPPED_COLUMNS: [&str; 4] = ["readable_date", "day_offset", "latitude", "longitude"];

/// The regression target.
pub const TARGET_COLUMN: &str = "aqi";

/// Ordered covariate names the model is trained on. The trainer registers
/// this list with every artifact and the predictor refuses to score when the
/// live list differs in content or order.
pub const COVARIATE_COLUMNS: [&str; 16] = [
    "hour",
    "day",
    "month",
    "aqi_change_rate",
    "co",
    "no",
    "no2",
    "o3",
    "so2",
    "pm2_5",
    "pm10",
    "nh3",
    "max_temp",
    "min_temp",
    "precipitation",
    "max_wind_speed",
];

// ---

/// One instant air-pollution reading, normalized from the provider payload.
///
/// `aqi` and `components` are kept as raw JSON values here: the provider is
/// free to send numbers as strings, and deciding whether that is fatal
/// belongs to the row assembler (a malformed number fails one row, not the
/// fetch).
#[derive(Debug, Clone)]
pub struct PollutionSnapshot {
    // ---
    /// Reading time, epoch seconds UTC.
    pub timestamp: i64,
    pub aqi: Value,
    pub components: serde_json::Map<String, Value>,
    pub latitude: f64,
    pub longitude: f64,
}

/// One calendar day's weather aggregate, sliced out of the provider's
/// parallel daily arrays. Carries no timestamp of its own; the pollution
/// snapshot owns the date derivation. `precipitation` may be JSON null
/// upstream (a day with no measurable rain).
#[derive(Debug, Clone)]
pub struct WeatherDailySlice {
    // ---
    pub max_temp: Value,
    pub min_temp: Value,
    pub precipitation: Value,
    pub max_wind_speed: Value,
}

/// The canonical, fully-typed feature record persisted to the feature store
/// and consumed by the model. `readable_date` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeatureRow {
    // ---
    /// `%Y-%m-%d`, derived from the pollution snapshot's UTC timestamp.
    pub readable_date: String,
    /// Signed distance in days from "today": negative for backfill,
    /// positive for forecast, 0 for a current-day ingest.
    pub day_offset: i32,
    pub hour: i32,
    pub day: i32,
    pub month: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub aqi: i32,
    /// 0 for the first row of a sequence, otherwise the delta against the
    /// last successfully observed AQI.
    pub aqi_change_rate: i32,
    pub co: f64,
    pub no: f64,
    pub no2: f64,
    pub o3: f64,
    pub so2: f64,
    pub pm2_5: f64,
    pub pm10: f64,
    pub nh3: f64,
    pub max_temp: f64,
    pub min_temp: f64,
    pub precipitation: f64,
    pub max_wind_speed: f64,
}

impl FeatureRow {
    // ---
    /// Covariate values in `COVARIATE_COLUMNS` order.
    pub fn covariates(&self) -> Vec<f64> {
        // ---
        vec![
            f64::from(self.hour),
            f64::from(self.day),
            f64::from(self.month),
            f64::from(self.aqi_change_rate),
            self.co,
            self.no,
            self.no2,
            self.o3,
            self.so2,
            self.pm2_5,
            self.pm10,
            self.nh3,
            self.max_temp,
            self.min_temp,
            self.precipitation,
            self.max_wind_speed,
        ]
    }

    /// Covariate names in the order `covariates` emits values.
    pub fn covariate_names() -> Vec<String> {
        COVARIATE_COLUMNS.iter().map(|c| c.to_string()).collect()
    }
}

// ---
