//! Model selection and forecast scoring.
//!
//! Resolves the latest registered model version, rebuilds the forecast
//! feature sequence with exactly the training-time assembly, and scores
//! each assembled row. The live covariate layout is checked against the
//! trained schema before anything is scored: a silent mismatch would
//! produce a wrong prediction instead of an error, which is unacceptable.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::error::{PipelineError, PipelineResult};
use crate::models::FeatureRow;
use crate::registry::ModelRegistry;
use crate::sequence::{build_sequence, Direction};
use crate::sources::{PollutionSource, WeatherSource};

// ---

/// One scored forecast day.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub day_offset: i32,
    pub predicted_aqi: f64,
}

/// A full forecast run: one prediction per successfully assembled row.
/// Skipped offsets produce no prediction, not a placeholder.
#[derive(Debug, Serialize)]
pub struct ForecastOutcome {
    pub model_name: String,
    pub model_version: i32,
    pub predictions: Vec<Prediction>,
    pub skipped_offsets: BTreeSet<u32>,
}

// ---

/// Score a `day_count`-day forecast with the latest version of `model_name`.
pub async fn forecast<P, W>(
    registry: &ModelRegistry,
    pollution: &P,
    weather: &W,
    lat: f64,
    lon: f64,
    today: NaiveDate,
    day_count: u32,
    model_name: &str,
) -> PipelineResult<ForecastOutcome>
where
    P: PollutionSource + ?Sized,
    W: WeatherSource + ?Sized,
{
    // ---
    let version = registry.latest_version(model_name).await?;
    let artifact = registry.load(model_name, version).await?;
    info!("Forecasting {day_count} days with model '{model_name}' v{version}");

    ensure_schema(&artifact.covariates, &FeatureRow::covariate_names())?;

    let outcome =
        build_sequence(pollution, weather, lat, lon, today, day_count, Direction::Future).await;

    let predictions = outcome
        .rows
        .iter()
        .map(|row| Prediction {
            day_offset: row.day_offset,
            predicted_aqi: artifact
                .forest
                .predict_row(&artifact.scaler.transform_row(&row.covariates())),
        })
        .collect();

    Ok(ForecastOutcome {
        model_name: model_name.to_string(),
        model_version: version,
        predictions,
        skipped_offsets: outcome.skipped,
    })
}

/// The live covariate list must match the trained schema exactly: same
/// names, same order.
pub fn ensure_schema(expected: &[String], actual: &[String]) -> PipelineResult<()> {
    // ---
    if expected != actual {
        return Err(PipelineError::SchemaMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matching_schema_passes() {
        let schema = names(&["co", "no", "no2"]);
        assert!(ensure_schema(&schema, &schema).is_ok());
    }

    #[test]
    fn differing_column_fails_fast() {
        // ---
        let trained = names(&["co", "no2", "o3"]);
        let live = names(&["co", "no", "o3"]);
        match ensure_schema(&trained, &live) {
            Err(PipelineError::SchemaMismatch { expected, actual }) => {
                assert_eq!(expected, trained);
                assert_eq!(actual, live);
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn reordered_columns_fail_fast() {
        // ---
        let trained = names(&["co", "no", "o3"]);
        let live = names(&["no", "co", "o3"]);
        assert!(matches!(
            ensure_schema(&trained, &live),
            Err(PipelineError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn missing_column_fails_fast() {
        // ---
        let trained = names(&["co", "no", "o3"]);
        let live = names(&["co", "no"]);
        assert!(ensure_schema(&trained, &live).is_err());
    }
}
