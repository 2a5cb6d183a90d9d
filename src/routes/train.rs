use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::post, Json,
    Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, info};

use crate::registry::ModelRegistry;
use crate::store::FeatureStore;
use crate::trainer::{self, RegressionReport, TrainOptions};
use crate::Config;

use super::{error_response, ErrorBody};

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new().route("/pipeline/train", post(handler))
}

/// Query parameters for the training endpoint.
#[derive(Debug, Deserialize)]
struct TrainQuery {
    /// Run the randomized hyperparameter search (default false).
    tune: Option<bool>,
}

/// Summary of one training run.
#[derive(Debug, Serialize)]
struct TrainResponse {
    model_name: String,
    version: i32,
    rows: usize,
    metrics: RegressionReport,
}

/// Read the feature table, fit a model, and register the new version.
async fn handler(
    Query(params): Query<TrainQuery>,
    State((pool, config)): State<(PgPool, Config)>,
) -> impl IntoResponse {
    // ---
    let options = TrainOptions {
        tune: params.tune.unwrap_or(false),
        ..TrainOptions::default()
    };
    info!("POST /pipeline/train - Starting training (tune: {})", options.tune);

    let rows = match FeatureStore::new(pool.clone()).read_all().await {
        Ok(rows) => rows,
        Err(e) => {
            error!("Failed to read feature table: {e}");
            return error_response(&e).into_response();
        }
    };
    let row_count = rows.len();
    info!("Training on {row_count} feature rows");

    // Fitting is CPU-bound (minutes with the search enabled); keep it off
    // the runtime worker threads.
    let fitted = tokio::task::spawn_blocking(move || trainer::train(&rows, &options)).await;
    let (artifact, report) = match fitted {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            error!("Training failed: {e}");
            return error_response(&e).into_response();
        }
        Err(e) => {
            error!("Training task panicked: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "training task failed".to_string(),
                }),
            )
                .into_response();
        }
    };

    let version = match ModelRegistry::new(pool)
        .register(&config.model_name, &artifact, &report)
        .await
    {
        Ok(version) => version,
        Err(e) => {
            error!("Model registration failed: {e}");
            return error_response(&e).into_response();
        }
    };

    info!(
        "Training complete: '{}' v{version} (MAE {:.4}, R2 {:.4})",
        config.model_name, report.mae, report.r2
    );
    (
        StatusCode::OK,
        Json(TrainResponse {
            model_name: config.model_name.clone(),
            version,
            rows: row_count,
            metrics: report,
        }),
    )
        .into_response()
}
