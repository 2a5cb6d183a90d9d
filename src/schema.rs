//! Database schema management for `aqiflow`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `feature_rows` table backing the feature store and the
/// `model_registry` table backing the model registry. Safe to call on every
/// startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Feature table: one fully-typed row per calendar day, keyed by the
    // readable date derived from the pollution timestamp.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feature_rows (
            id              SERIAL PRIMARY KEY,
            readable_date   TEXT             NOT NULL UNIQUE,
            day_offset      INTEGER          NOT NULL,
            hour            INTEGER          NOT NULL,
            day             INTEGER          NOT NULL,
            month           INTEGER          NOT NULL,
            latitude        DOUBLE PRECISION NOT NULL,
            longitude       DOUBLE PRECISION NOT NULL,
            aqi             INTEGER          NOT NULL,
            aqi_change_rate INTEGER          NOT NULL,
            co              DOUBLE PRECISION NOT NULL,
            no              DOUBLE PRECISION NOT NULL,
            no2             DOUBLE PRECISION NOT NULL,
            o3              DOUBLE PRECISION NOT NULL,
            so2             DOUBLE PRECISION NOT NULL,
            pm2_5           DOUBLE PRECISION NOT NULL,
            pm10            DOUBLE PRECISION NOT NULL,
            nh3             DOUBLE PRECISION NOT NULL,
            max_temp        DOUBLE PRECISION NOT NULL,
            min_temp        DOUBLE PRECISION NOT NULL,
            precipitation   DOUBLE PRECISION NOT NULL,
            max_wind_speed  DOUBLE PRECISION NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Registry of trained model artifacts; versions are append-only.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS model_registry (
            name          TEXT        NOT NULL,
            version       INTEGER     NOT NULL,
            artifact      TEXT        NOT NULL,
            metrics       TEXT,
            registered_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (name, version)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Basic indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_feature_rows_day_offset
            ON feature_rows (day_offset);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_model_registry_name
            ON model_registry (name);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
