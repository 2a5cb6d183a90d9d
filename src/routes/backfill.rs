use std::collections::BTreeSet;

use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::post, Json,
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, info};

use crate::sequence::{build_sequence, Direction};
use crate::sources::{PollutionApi, PollutionEndpoint, WeatherApi, WeatherEndpoint};
use crate::store::FeatureStore;
use crate::Config;

use super::{error_response, ErrorBody};

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new().route("/pipeline/backfill", post(handler))
}

/// Query parameters for the backfill endpoint.
#[derive(Debug, Deserialize)]
struct BackfillQuery {
    /// How many days back to fill (default 400).
    days: Option<u32>,
}

/// Summary of one backfill run.
#[derive(Debug, Serialize)]
struct BackfillResponse {
    requested_days: u32,
    inserted: u64,
    skipped_offsets: BTreeSet<u32>,
}

/// Build the historical sequence oldest-day-first and upsert every
/// assembled row into the feature store.
async fn handler(
    Query(params): Query<BackfillQuery>,
    State((pool, config)): State<(PgPool, Config)>,
) -> impl IntoResponse {
    // ---
    let days = params.days.unwrap_or(400).max(1);
    info!("POST /pipeline/backfill - Backfilling {days} days");

    let pollution = PollutionApi::new(&config, PollutionEndpoint::History);
    let weather = WeatherApi::new(&config, WeatherEndpoint::Archive);
    let today = Utc::now().date_naive();

    let outcome = build_sequence(
        &pollution,
        &weather,
        config.latitude,
        config.longitude,
        today,
        days,
        Direction::Past,
    )
    .await;

    if outcome.rows.is_empty() {
        error!(
            "Backfill assembled no rows; all {} offsets skipped",
            outcome.skipped.len()
        );
        return (
            StatusCode::BAD_GATEWAY,
            Json(ErrorBody {
                error: "no historical rows could be assembled".to_string(),
            }),
        )
            .into_response();
    }

    let inserted = match FeatureStore::new(pool).insert(&outcome.rows).await {
        Ok(count) => count,
        Err(e) => {
            error!("Failed to store backfill rows: {e}");
            return error_response(&e).into_response();
        }
    };

    info!(
        "Backfill complete: {inserted} rows inserted, {} offsets skipped",
        outcome.skipped.len()
    );
    (
        StatusCode::OK,
        Json(BackfillResponse {
            requested_days: days,
            inserted,
            skipped_offsets: outcome.skipped,
        }),
    )
        .into_response()
}
