use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info};

use crate::registry::ModelRegistry;
use crate::sources::{PollutionApi, PollutionEndpoint, WeatherApi, WeatherEndpoint};
use crate::{predictor, Config};

use super::{error_response, ErrorBody};

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new().route("/predict", get(handler))
}

/// Query parameters for the forecast endpoint.
#[derive(Debug, Deserialize)]
struct PredictQuery {
    /// Forecast horizon in days (default 3).
    days: Option<u32>,
    /// Model name override; defaults to the configured name.
    model: Option<String>,
}

async fn handler(
    Query(params): Query<PredictQuery>,
    State((pool, config)): State<(PgPool, Config)>,
) -> impl IntoResponse {
    // ---
    // The pollution forecast feed covers a few days out; cap the horizon
    // rather than fetching windows that can never be filled.
    let day_count = params.days.unwrap_or(3).clamp(1, 7);
    let model_name = params
        .model
        .unwrap_or_else(|| config.model_name.clone());

    info!("GET /predict - {day_count}-day forecast with model '{model_name}'");

    let registry = ModelRegistry::new(pool);
    let pollution = PollutionApi::new(&config, PollutionEndpoint::Forecast);
    let weather = WeatherApi::new(&config, WeatherEndpoint::Forecast);
    let today = Utc::now().date_naive();

    match predictor::forecast(
        &registry,
        &pollution,
        &weather,
        config.latitude,
        config.longitude,
        today,
        day_count,
        &model_name,
    )
    .await
    {
        Ok(outcome) if outcome.predictions.is_empty() => {
            // Every offset was skipped: report an error payload instead of
            // an empty forecast.
            error!(
                "No forecast rows assembled, skipped offsets {:?}",
                outcome.skipped_offsets
            );
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorBody {
                    error: "no forecast data available for prediction".to_string(),
                }),
            )
                .into_response()
        }
        Ok(outcome) => {
            info!(
                "Returning {} predictions ({} offsets skipped)",
                outcome.predictions.len(),
                outcome.skipped_offsets.len()
            );
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(e) => {
            error!("Forecast failed: {e}");
            error_response(&e).into_response()
        }
    }
}
