//! Configuration loader for the `aqiflow` backend service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase, improving
//!
use std::env;

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional float environment variable with a default value.
macro_rules! parse_env_f64 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<f64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Parse an optional string environment variable with a default value.
macro_rules! env_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Air-pollution API base URL (current readings; the history and
    /// forecast endpoints hang off this path).
    pub pollution_api_url: String,

    /// Air-pollution API key.
    pub open_weather_api_key: String,

    /// Weather forecast API base URL.
    pub weather_forecast_url: String,

    /// Weather archive API base URL (historical daily aggregates).
    pub weather_archive_url: String,

    /// Fixed geolocation the pipeline ingests and forecasts for.
    pub latitude: f64,
    pub longitude: f64,

    /// Model name used for training registration and forecast resolution.
    pub model_name: String,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
/// - `OPEN_WEATHER_API_KEY` – air-pollution API key
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `POLLUTION_API_URL`, `WEATHER_FORECAST_URL`, `WEATHER_ARCHIVE_URL`
///   – provider base URLs (default: the public endpoints)
/// - `LATITUDE`, `LONGITUDE` – target location (default: Karachi)
/// - `MODEL_NAME` – registry model name (default: `random_forest`)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let open_weather_api_key = require_env!("OPEN_WEATHER_API_KEY");
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);

    let pollution_api_url = env_or!(
        "POLLUTION_API_URL",
        "http://api.openweathermap.org/data/2.5/air_pollution"
    );
    let weather_forecast_url = env_or!(
        "WEATHER_FORECAST_URL",
        "https://api.open-meteo.com/v1/forecast"
    );
    let weather_archive_url = env_or!(
        "WEATHER_ARCHIVE_URL",
        "https://archive-api.open-meteo.com/v1/archive"
    );

    let latitude = parse_env_f64!("LATITUDE", 24.8607);
    let longitude = parse_env_f64!("LONGITUDE", 67.0011);
    let model_name = env_or!("MODEL_NAME", "random_forest");

    Ok(Config {
        db_url,
        db_pool_max,
        pollution_api_url,
        open_weather_api_key,
        weather_forecast_url,
        weather_archive_url,
        latitude,
        longitude,
        model_name,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords and API keys
    /// while showing all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        // Mask the password in the database URL for security
        let masked_db_url = if let Some(at_pos) = self.db_url.rfind('@') {
            if let Some(colon_pos) = self.db_url[..at_pos].rfind(':') {
                format!(
                    "{}:****{}",
                    &self.db_url[..colon_pos],
                    &self.db_url[at_pos..]
                )
            } else {
                self.db_url.clone()
            }
        } else {
            self.db_url.clone()
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL         : {}", masked_db_url);
        tracing::info!("  DB_POOL_MAX          : {}", self.db_pool_max);
        tracing::info!("  POLLUTION_API_URL    : {}", self.pollution_api_url);
        tracing::info!("  OPEN_WEATHER_API_KEY : ****");
        tracing::info!("  WEATHER_FORECAST_URL : {}", self.weather_forecast_url);
        tracing::info!("  WEATHER_ARCHIVE_URL  : {}", self.weather_archive_url);
        tracing::info!("  LATITUDE             : {}", self.latitude);
        tracing::info!("  LONGITUDE            : {}", self.longitude);
        tracing::info!("  MODEL_NAME           : {}", self.model_name);
    }
}
