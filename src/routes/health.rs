// src/routes/health.rs
//! API health check endpoint for the aqiflow backend.
//!
//! Defines the `/health` route used by container orchestrators and CI
//! pipelines to verify that the service is up. Sibling module in the
//! `routes` directory following the Explicit Module Boundary Pattern (EMBP):
//! the gateway (`mod.rs`) merges the subrouter exported here, so `main.rs`
//! never learns about individual endpoints.

use axum::{routing::get, Json, Router};
use serde::Serialize;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

/// Handle `GET /health`.
///
/// Deliberately lightweight: answers without touching the database, the
/// model registry, or either external provider.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
    })
}

/// Create a subrouter containing the `/health` route.
///
/// Generic over the application state so it merges cleanly with the gateway
/// router regardless of the state type (e.g., `(PgPool, Config)`).
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
