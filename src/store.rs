//! Feature store gateway.
//!
//! Thin persistence wrapper over the `feature_rows` table. Inserts are
//! idempotent upserts keyed on `readable_date` (the natural key), so a
//! re-run of ingest or backfill overwrites the same day instead of
//! duplicating it.

use sqlx::PgPool;

use crate::error::PipelineResult;
use crate::models::FeatureRow;

// ---

pub struct FeatureStore {
    pool: PgPool,
}

impl FeatureStore {
    // ---
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert a batch of rows. Returns the number of rows written.
    pub async fn insert(&self, rows: &[FeatureRow]) -> PipelineResult<u64> {
        // ---
        let mut written = 0;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO feature_rows (
                    readable_date, day_offset, hour, day, month,
                    latitude, longitude, aqi, aqi_change_rate,
                    co, no, no2, o3, so2, pm2_5, pm10, nh3,
                    max_temp, min_temp, precipitation, max_wind_speed
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19, $20, $21
                )
                ON CONFLICT (readable_date) DO UPDATE SET
                    day_offset      = EXCLUDED.day_offset,
                    hour            = EXCLUDED.hour,
                    day             = EXCLUDED.day,
                    month           = EXCLUDED.month,
                    latitude        = EXCLUDED.latitude,
                    longitude       = EXCLUDED.longitude,
                    aqi             = EXCLUDED.aqi,
                    aqi_change_rate = EXCLUDED.aqi_change_rate,
                    co              = EXCLUDED.co,
                    no              = EXCLUDED.no,
                    no2             = EXCLUDED.no2,
                    o3              = EXCLUDED.o3,
                    so2             = EXCLUDED.so2,
                    pm2_5           = EXCLUDED.pm2_5,
                    pm10            = EXCLUDED.pm10,
                    nh3             = EXCLUDED.nh3,
                    max_temp        = EXCLUDED.max_temp,
                    min_temp        = EXCLUDED.min_temp,
                    precipitation   = EXCLUDED.precipitation,
                    max_wind_speed  = EXCLUDED.max_wind_speed
                "#,
            )
            .bind(&row.readable_date)
            .bind(row.day_offset)
            .bind(row.hour)
            .bind(row.day)
            .bind(row.month)
            .bind(row.latitude)
            .bind(row.longitude)
            .bind(row.aqi)
            .bind(row.aqi_change_rate)
            .bind(row.co)
            .bind(row.no)
            .bind(row.no2)
            .bind(row.o3)
            .bind(row.so2)
            .bind(row.pm2_5)
            .bind(row.pm10)
            .bind(row.nh3)
            .bind(row.max_temp)
            .bind(row.min_temp)
            .bind(row.precipitation)
            .bind(row.max_wind_speed)
            .execute(&self.pool)
            .await?;
            written += 1;
        }
        Ok(written)
    }

    /// Read the whole feature table in chronological order.
    pub async fn read_all(&self) -> PipelineResult<Vec<FeatureRow>> {
        // ---
        let rows = sqlx::query_as::<_, FeatureRow>(
            r#"
            SELECT readable_date, day_offset, hour, day, month,
                   latitude, longitude, aqi, aqi_change_rate,
                   co, no, no2, o3, so2, pm2_5, pm10, nh3,
                   max_temp, min_temp, precipitation, max_wind_speed
            FROM feature_rows
            ORDER BY readable_date
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
