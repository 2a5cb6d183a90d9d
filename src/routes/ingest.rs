use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};
use chrono::{NaiveTime, Utc};
use sqlx::PgPool;
use tracing::{error, info};

use crate::assemble::assemble;
use crate::sources::{
    DateRange, DayWindow, PollutionApi, PollutionEndpoint, PollutionSource, WeatherApi,
    WeatherEndpoint, WeatherSource,
};
use crate::store::FeatureStore;
use crate::{error::PipelineError, Config};

use super::error_response;

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new().route("/pipeline/ingest", post(handler))
}

/// Assemble today's feature row from the current pollution reading and
/// today's weather aggregate, then upsert it into the feature store.
async fn handler(State((pool, config)): State<(PgPool, Config)>) -> impl IntoResponse {
    // ---
    info!("POST /pipeline/ingest - Starting current-day ingest");

    let pollution = PollutionApi::new(&config, PollutionEndpoint::Current);
    let weather = WeatherApi::new(&config, WeatherEndpoint::Forecast);

    let today = Utc::now().date_naive();
    let midnight = today.and_time(NaiveTime::MIN).and_utc().timestamp();
    let window = DayWindow {
        start: midnight,
        end: midnight + 86_400,
    };

    let snapshot = match pollution
        .fetch_pollution(config.latitude, config.longitude, window)
        .await
    {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Current pollution fetch failed: {e}");
            return error_response(&e).into_response();
        }
    };

    let range = DateRange {
        start: today,
        end: today,
    };
    let slice = match weather
        .fetch_weather(config.latitude, config.longitude, range)
        .await
    {
        Ok(slices) if !slices.is_empty() => slices[0].clone(),
        Ok(_) => {
            let e = PipelineError::unavailable("weather", "daily array is empty for today");
            error!("{e}");
            return error_response(&e).into_response();
        }
        Err(e) => {
            error!("Weather fetch failed: {e}");
            return error_response(&e).into_response();
        }
    };

    // A single-row ingest has no prior observation; its change rate is 0.
    let row = match assemble(&snapshot, &slice, 0, None) {
        Ok((row, _)) => row,
        Err(e) => {
            error!("Row assembly failed: {e}");
            return error_response(&e).into_response();
        }
    };

    if let Err(e) = FeatureStore::new(pool).insert(std::slice::from_ref(&row)).await {
        error!("Failed to store feature row: {e}");
        return error_response(&e).into_response();
    }

    info!("Ingested feature row for {}", row.readable_date);
    (StatusCode::OK, Json(row)).into_response()
}
