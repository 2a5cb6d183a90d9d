//! Model training: preprocessing, hyperparameter search, evaluation, and
//! artifact assembly.
//!
//! The trainer drops the identifier columns, standardizes the covariates
//! with parameters fit on the training partition only, fits the forest, and
//! reports MAE/MSE/RMSE/R² on the held-out partition. The fitted scaler and
//! the exact ordered covariate list travel with the forest inside
//! [`TrainedArtifact`] so inference scores on the same footing.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::forest::{FeatureSampling, ForestParams, RandomForest};
use crate::metrics;
use crate::models::{FeatureRow, DROPPED_COLUMNS, TARGET_COLUMN};

// ---

/// Held-out fraction for the train/test split.
const TEST_FRACTION: f64 = 0.2;

/// Minimum rows to attempt a fit at all.
const MIN_ROWS: usize = 10;

/// Randomized-search draws and cross-validation folds.
const SEARCH_ITERATIONS: usize = 10;
const CV_FOLDS: usize = 5;

/// Zero-mean unit-variance scaling, fit on the training partition only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl Standardizer {
    // ---
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let dims = rows.first().map_or(0, Vec::len);
        let n = rows.len().max(1) as f64;

        let mut means = vec![0.0; dims];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }

        let mut stds = vec![0.0; dims];
        for row in rows {
            for ((s, v), m) in stds.iter_mut().zip(row).zip(&means) {
                *s += (v - m) * (v - m);
            }
        }
        for s in &mut stds {
            *s = (*s / n).sqrt();
            // A constant column scales by 1 so it passes through centered.
            if *s == 0.0 {
                *s = 1.0;
            }
        }

        Self { means, stds }
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        // ---
        row.iter()
            .zip(&self.means)
            .zip(&self.stds)
            .map(|((v, m), s)| (v - m) / s)
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}

/// Held-out evaluation metrics for one training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionReport {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub r2: f64,
}

/// Everything inference needs, serialized into the model registry as one
/// artifact: the forest, the fitted scaler, and the exact ordered covariate
/// names the forest was trained on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedArtifact {
    pub covariates: Vec<String>,
    pub scaler: Standardizer,
    pub forest: RandomForest,
}

/// Knobs for one training run.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Run the randomized hyperparameter search before the final fit.
    pub tune: bool,
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            tune: false,
            seed: 42,
        }
    }
}

// ---

/// Fit a forest on the feature table and evaluate it on the held-out split.
pub fn train(
    rows: &[FeatureRow],
    options: &TrainOptions,
) -> PipelineResult<(TrainedArtifact, RegressionReport)> {
    // ---
    if rows.len() < MIN_ROWS {
        return Err(PipelineError::InsufficientData {
            required: MIN_ROWS,
            actual: rows.len(),
        });
    }

    debug!(
        "Regressing '{TARGET_COLUMN}' on {} covariates ({:?} dropped)",
        FeatureRow::covariate_names().len(),
        DROPPED_COLUMNS
    );
    let x_raw: Vec<Vec<f64>> = rows.iter().map(FeatureRow::covariates).collect();
    let y: Vec<f64> = rows.iter().map(|r| f64::from(r.aqi)).collect();

    let (train_idx, test_idx) = train_test_split(rows.len(), TEST_FRACTION, options.seed);
    let gather = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<f64>) {
        (
            idx.iter().map(|&i| x_raw[i].clone()).collect(),
            idx.iter().map(|&i| y[i]).collect(),
        )
    };
    let (x_train_raw, y_train) = gather(&train_idx);
    let (x_test_raw, y_test) = gather(&test_idx);

    let scaler = Standardizer::fit(&x_train_raw);
    let x_train = scaler.transform(&x_train_raw);
    let x_test = scaler.transform(&x_test_raw);

    let params = if options.tune {
        randomized_search(&x_train, &y_train, options.seed)
    } else {
        ForestParams::default()
    };
    info!(
        "Fitting forest on {} rows ({} held out): {params:?}",
        x_train.len(),
        x_test.len()
    );

    let forest = RandomForest::fit(&x_train, &y_train, params, options.seed);

    let predicted = forest.predict(&x_test);
    let report = RegressionReport {
        mae: metrics::mae(&y_test, &predicted),
        mse: metrics::mse(&y_test, &predicted),
        rmse: metrics::rmse(&y_test, &predicted),
        r2: metrics::r2(&y_test, &predicted),
    };
    info!(
        "Held-out metrics: MAE {:.4}, MSE {:.4}, RMSE {:.4}, R2 {:.4}",
        report.mae, report.mse, report.rmse, report.r2
    );

    Ok((
        TrainedArtifact {
            covariates: FeatureRow::covariate_names(),
            scaler,
            forest,
        },
        report,
    ))
}

// ---

/// Deterministic shuffled split into (train, test) index sets.
fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    // ---
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));

    let n_test = ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1);
    let test = indices.split_off(n - n_test);
    (indices, test)
}

/// Deterministic k-fold partition: each index appears in exactly one
/// validation fold.
fn k_folds(n: usize, k: usize, seed: u64) -> Vec<(Vec<usize>, Vec<usize>)> {
    // ---
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));

    let k = k.clamp(2, n.max(2));
    (0..k)
        .map(|fold| {
            let (train, validate): (Vec<(usize, usize)>, Vec<(usize, usize)>) = indices
                .iter()
                .enumerate()
                .map(|(pos, &i)| (pos % k, i))
                .partition(|(pos, _)| *pos != fold);
            (
                train.into_iter().map(|(_, i)| i).collect(),
                validate.into_iter().map(|(_, i)| i).collect(),
            )
        })
        .collect()
}

/// One random draw from the bounded search grid.
fn sample_params(rng: &mut StdRng) -> ForestParams {
    // ---
    const N_TREES: [usize; 12] = [
        100, 200, 300, 400, 500, 600, 700, 800, 900, 1000, 1100, 1200,
    ];
    const MAX_DEPTH: [usize; 6] = [5, 10, 15, 20, 25, 30];
    const MIN_SPLIT: [usize; 5] = [2, 5, 10, 15, 100];
    const MIN_LEAF: [usize; 4] = [1, 2, 5, 10];
    const SAMPLING: [FeatureSampling; 2] = [FeatureSampling::All, FeatureSampling::Sqrt];

    fn pick(values: &[usize], rng: &mut StdRng) -> usize {
        *values.choose(rng).unwrap_or(&values[0])
    }

    ForestParams {
        n_trees: pick(&N_TREES, rng),
        max_depth: Some(pick(&MAX_DEPTH, rng)),
        min_samples_split: pick(&MIN_SPLIT, rng),
        min_samples_leaf: pick(&MIN_LEAF, rng),
        feature_sampling: *SAMPLING.choose(rng).unwrap_or(&FeatureSampling::All),
    }
}

/// Randomized search over the bounded grid, scored by negative MSE under
/// k-fold cross-validation. Returns the best-scoring draw.
fn randomized_search(x: &[Vec<f64>], y: &[f64], seed: u64) -> ForestParams {
    // ---
    let mut rng = StdRng::seed_from_u64(seed);
    let folds = k_folds(x.len(), CV_FOLDS, seed);

    let mut best: Option<(ForestParams, f64)> = None;
    for iteration in 0..SEARCH_ITERATIONS {
        let candidate = sample_params(&mut rng);
        let score = -cross_val_mse(x, y, &folds, &candidate, seed);
        debug!("Search iteration {iteration}: score {score:.4} for {candidate:?}");

        let improved = best
            .as_ref()
            .map_or(true, |(_, s)| score.is_finite() && score > *s);
        if improved {
            best = Some((candidate, score));
        }
    }

    match best {
        Some((params, score)) => {
            info!("Best search score {score:.4} with {params:?}");
            params
        }
        None => ForestParams::default(),
    }
}

fn cross_val_mse(
    x: &[Vec<f64>],
    y: &[f64],
    folds: &[(Vec<usize>, Vec<usize>)],
    params: &ForestParams,
    seed: u64,
) -> f64 {
    // ---
    if folds.is_empty() {
        return f64::INFINITY;
    }
    let mut total = 0.0;
    for (train, validate) in folds {
        let x_train: Vec<Vec<f64>> = train.iter().map(|&i| x[i].clone()).collect();
        let y_train: Vec<f64> = train.iter().map(|&i| y[i]).collect();
        let x_val: Vec<Vec<f64>> = validate.iter().map(|&i| x[i].clone()).collect();
        let y_val: Vec<f64> = validate.iter().map(|&i| y[i]).collect();

        let forest = RandomForest::fit(&x_train, &y_train, params.clone(), seed);
        total += metrics::mse(&y_val, &forest.predict(&x_val));
    }
    total / folds.len() as f64
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::COVARIATE_COLUMNS;

    fn synthetic_rows(n: usize) -> Vec<FeatureRow> {
        // ---
        (0..n)
            .map(|i| {
                let pm = 5.0 + (i % 11) as f64 * 4.0;
                FeatureRow {
                    readable_date: format!("2025-01-{:02}", (i % 28) + 1),
                    day_offset: -(i as i32),
                    hour: (i % 24) as i32,
                    day: ((i % 28) + 1) as i32,
                    month: 1,
                    latitude: 24.8607,
                    longitude: 67.0011,
                    aqi: ((pm / 12.0).ceil() as i32).min(5),
                    aqi_change_rate: (i % 3) as i32 - 1,
                    co: 180.0 + i as f64,
                    no: 0.2,
                    no2: 1.1,
                    o3: 60.0,
                    so2: 0.8,
                    pm2_5: pm,
                    pm10: pm * 1.4,
                    nh3: 0.5,
                    max_temp: 28.0 + (i % 5) as f64,
                    min_temp: 19.0,
                    precipitation: 0.0,
                    max_wind_speed: 11.0,
                }
            })
            .collect()
    }

    #[test]
    fn split_is_deterministic_and_disjoint() {
        // ---
        let (train_a, test_a) = train_test_split(50, 0.2, 42);
        let (train_b, test_b) = train_test_split(50, 0.2, 42);
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_eq!(test_a.len(), 10);
        assert_eq!(train_a.len(), 40);

        let mut all: Vec<usize> = train_a.iter().chain(&test_a).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn standardizer_centers_and_scales() {
        // ---
        let rows = vec![
            vec![1.0, 10.0, 7.0],
            vec![2.0, 20.0, 7.0],
            vec![3.0, 30.0, 7.0],
        ];
        let scaler = Standardizer::fit(&rows);
        let scaled = scaler.transform(&rows);

        for col in 0..3 {
            let mean: f64 = scaled.iter().map(|r| r[col]).sum::<f64>() / 3.0;
            assert!(mean.abs() < 1e-12);
        }
        // Non-constant columns get unit variance
        for col in 0..2 {
            let var: f64 = scaled.iter().map(|r| r[col] * r[col]).sum::<f64>() / 3.0;
            assert!((var - 1.0).abs() < 1e-12);
        }
        // A constant column becomes exactly zero, not NaN
        assert!(scaled.iter().all(|r| r[2] == 0.0));
    }

    #[test]
    fn k_folds_cover_every_index_once() {
        // ---
        let folds = k_folds(23, 5, 7);
        assert_eq!(folds.len(), 5);

        let mut validated: Vec<usize> = folds.iter().flat_map(|(_, v)| v.clone()).collect();
        validated.sort_unstable();
        assert_eq!(validated, (0..23).collect::<Vec<_>>());

        for (train, validate) in &folds {
            assert_eq!(train.len() + validate.len(), 23);
            assert!(validate.iter().all(|i| !train.contains(i)));
        }
    }

    #[test]
    fn sampled_params_stay_inside_the_grid() {
        // ---
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..25 {
            let params = sample_params(&mut rng);
            assert!((100..=1200).contains(&params.n_trees));
            assert_eq!(params.n_trees % 100, 0);
            assert!(matches!(params.max_depth, Some(d) if (5..=30).contains(&d) && d % 5 == 0));
            assert!([2, 5, 10, 15, 100].contains(&params.min_samples_split));
            assert!([1, 2, 5, 10].contains(&params.min_samples_leaf));
        }
    }

    #[test]
    fn trains_and_reports_on_the_held_out_split() {
        // ---
        let rows = synthetic_rows(40);
        let (artifact, report) = train(&rows, &TrainOptions::default()).unwrap();

        assert_eq!(artifact.covariates, FeatureRow::covariate_names());
        assert_eq!(artifact.covariates.len(), COVARIATE_COLUMNS.len());
        assert!(report.mae.is_finite() && report.mae >= 0.0);
        assert!(report.mse >= 0.0);
        assert!((report.rmse - report.mse.sqrt()).abs() < 1e-12);

        // The artifact survives the registry round trip
        let encoded = serde_json::to_string(&artifact).unwrap();
        let decoded: TrainedArtifact = serde_json::from_str(&encoded).unwrap();
        let probe = decoded.scaler.transform_row(&rows[0].covariates());
        assert!(decoded.forest.predict_row(&probe).is_finite());
    }

    #[test]
    fn same_seed_reproduces_the_report() {
        // ---
        let rows = synthetic_rows(30);
        let (_, a) = train(&rows, &TrainOptions::default()).unwrap();
        let (_, b) = train(&rows, &TrainOptions::default()).unwrap();
        assert_eq!(a.mae, b.mae);
        assert_eq!(a.mse, b.mse);
    }

    #[test]
    fn too_few_rows_is_an_explicit_error() {
        // ---
        let rows = synthetic_rows(4);
        match train(&rows, &TrainOptions::default()) {
            Err(PipelineError::InsufficientData { required, actual }) => {
                assert_eq!(required, MIN_ROWS);
                assert_eq!(actual, 4);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }
}
