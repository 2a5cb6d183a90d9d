//! Model registry gateway.
//!
//! Versioned, append-only storage for trained artifacts in the
//! `model_registry` table. A new training run always gets the next version
//! for its model name; existing versions are never overwritten. "Latest"
//! resolves to the highest version number, with the registration timestamp
//! as the tie-break should registrations ever race.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;

use crate::error::{PipelineError, PipelineResult};
use crate::trainer::{RegressionReport, TrainedArtifact};

// ---

pub struct ModelRegistry {
    pool: PgPool,
}

impl ModelRegistry {
    // ---
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a trained artifact under `name` and return the new version.
    pub async fn register(
        &self,
        name: &str,
        artifact: &TrainedArtifact,
        report: &RegressionReport,
    ) -> PipelineResult<i32> {
        // ---
        let mut tx = self.pool.begin().await?;

        let version: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM model_registry WHERE name = $1",
        )
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;

        let encoded = serde_json::to_string(artifact).map_err(|e| {
            PipelineError::CorruptArtifact {
                name: name.to_string(),
                version,
                reason: e.to_string(),
            }
        })?;
        let metrics = serde_json::to_string(report).unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO model_registry (name, version, artifact, metrics)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(name)
        .bind(version)
        .bind(&encoded)
        .bind(&metrics)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Registered model '{name}' v{version}");
        Ok(version)
    }

    /// All registered versions of `name` with their registration times.
    pub async fn list_versions(&self, name: &str) -> PipelineResult<Vec<(i32, DateTime<Utc>)>> {
        // ---
        let versions = sqlx::query_as(
            "SELECT version, registered_at FROM model_registry WHERE name = $1",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;
        Ok(versions)
    }

    /// Resolve the latest version of `name`, or `ModelNotFound`.
    pub async fn latest_version(&self, name: &str) -> PipelineResult<i32> {
        // ---
        let versions = self.list_versions(name).await?;
        pick_latest(&versions).ok_or_else(|| PipelineError::ModelNotFound(name.to_string()))
    }

    /// Load one registered artifact.
    pub async fn load(&self, name: &str, version: i32) -> PipelineResult<TrainedArtifact> {
        // ---
        let encoded: Option<String> = sqlx::query_scalar(
            "SELECT artifact FROM model_registry WHERE name = $1 AND version = $2",
        )
        .bind(name)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;

        let encoded = encoded.ok_or_else(|| PipelineError::ModelNotFound(name.to_string()))?;
        serde_json::from_str(&encoded).map_err(|e| PipelineError::CorruptArtifact {
            name: name.to_string(),
            version,
            reason: e.to_string(),
        })
    }
}

/// Highest version wins; equal versions fall back to the later
/// registration time.
pub fn pick_latest(versions: &[(i32, DateTime<Utc>)]) -> Option<i32> {
    // ---
    versions
        .iter()
        .max_by_key(|(version, registered_at)| (*version, *registered_at))
        .map(|(version, _)| *version)
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn latest_is_the_maximum_version() {
        // ---
        // Registry holding versions {1, 2, 4} resolves to 4.
        let versions = vec![(2, at(200)), (4, at(400)), (1, at(100))];
        assert_eq!(pick_latest(&versions), Some(4));
    }

    #[test]
    fn empty_registry_resolves_to_none() {
        assert_eq!(pick_latest(&[]), None);
    }

    #[test]
    fn version_ties_break_on_registration_time() {
        // ---
        let versions = vec![(3, at(100)), (3, at(500)), (2, at(900))];
        assert_eq!(pick_latest(&versions), Some(3));
    }
}
