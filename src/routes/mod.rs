use axum::{http::StatusCode, Json, Router};
use serde::Serialize;
use sqlx::PgPool;

use crate::error::PipelineError;
use crate::Config;

mod backfill;
mod health;
mod ingest;
mod predict;
mod train;

// ---

pub fn router(pool: PgPool, config: Config) -> Router {
    // ---
    Router::new()
        .merge(predict::router())
        .merge(ingest::router())
        .merge(backfill::router())
        .merge(train::router())
        .merge(health::router())
        .with_state((pool, config))
}

/// Structured error payload returned by every pipeline endpoint in place of
/// a stack trace.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Map a pipeline error onto an HTTP status and error payload.
pub(crate) fn error_response(err: &PipelineError) -> (StatusCode, Json<ErrorBody>) {
    // ---
    let status = match err {
        PipelineError::ModelNotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::Unavailable { .. } | PipelineError::MalformedSource { .. } => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}
