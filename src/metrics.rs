//! Regression metrics reported after training.

// ---

/// Mean absolute error.
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    // ---
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Mean squared error.
pub fn mse(actual: &[f64], predicted: &[f64]) -> f64 {
    // ---
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum::<f64>()
        / actual.len() as f64
}

/// Root mean squared error.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    mse(actual, predicted).sqrt()
}

/// Coefficient of determination. 1.0 for a perfect fit; a constant target
/// scores 1.0 only when predicted exactly.
pub fn r2(actual: &[f64], predicted: &[f64]) -> f64 {
    // ---
    if actual.is_empty() {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean) * (a - mean)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    const ACTUAL: [f64; 4] = [3.0, 2.0, 4.0, 5.0];
    const PREDICTED: [f64; 4] = [2.5, 2.0, 5.0, 4.5];

    #[test]
    fn mae_matches_hand_computation() {
        // |0.5| + |0| + |-1| + |0.5| = 2.0 over 4
        assert!((mae(&ACTUAL, &PREDICTED) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn mse_and_rmse_match_hand_computation() {
        // 0.25 + 0 + 1 + 0.25 = 1.5 over 4
        assert!((mse(&ACTUAL, &PREDICTED) - 0.375).abs() < 1e-12);
        assert!((rmse(&ACTUAL, &PREDICTED) - 0.375_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn r2_is_one_for_a_perfect_fit() {
        assert_eq!(r2(&ACTUAL, &ACTUAL), 1.0);
    }

    #[test]
    fn r2_is_zero_for_predicting_the_mean() {
        let mean = [3.5, 3.5, 3.5, 3.5];
        assert!((r2(&ACTUAL, &mean)).abs() < 1e-12);
    }

    #[test]
    fn constant_target_handled() {
        let constant = [2.0, 2.0, 2.0];
        assert_eq!(r2(&constant, &constant), 1.0);
        assert_eq!(r2(&constant, &[2.0, 2.0, 3.0]), 0.0);
    }
}
