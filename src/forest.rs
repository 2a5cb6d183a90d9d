//! Random-forest regressor: bootstrap-aggregated variance-reduction trees.
//!
//! The trees split on the threshold minimizing the summed squared error of
//! the two children, found by a prefix-sum scan over each candidate
//! feature's sorted values. Everything is seeded so a training run is
//! reproducible, and the whole ensemble serializes to JSON for the model
//! registry.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// ---

/// How many candidate features each split considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSampling {
    /// Every feature at every split.
    All,
    /// `ceil(sqrt(n_features))` random features per split.
    Sqrt,
}

/// Forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    // ---
    pub n_trees: usize,
    /// `None` grows trees until the sample minimums stop them.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub feature_sampling: FeatureSampling,
}

impl Default for ForestParams {
    fn default() -> Self {
        // ---
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            feature_sampling: FeatureSampling::All,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, row: &[f64]) -> f64 {
        // ---
        match self {
            TreeNode::Leaf { value } => *value,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row.get(*feature).copied().unwrap_or(0.0) <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }
}

/// A single regression tree, fit on one bootstrap sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: TreeNode,
}

impl DecisionTree {
    // ---
    pub fn fit(x: &[Vec<f64>], y: &[f64], indices: &[usize], params: &ForestParams, rng: &mut StdRng) -> Self {
        let mut builder = TreeBuilder { x, y, params, rng };
        Self {
            root: builder.grow(indices.to_vec(), 0),
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.root.predict(row)
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: &'a ForestParams,
    rng: &'a mut StdRng,
}

impl TreeBuilder<'_> {
    // ---
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let mean = indices.iter().map(|&i| self.y[i]).sum::<f64>() / indices.len() as f64;

        let depth_exhausted = self
            .params
            .max_depth
            .is_some_and(|limit| depth >= limit);
        if indices.len() < self.params.min_samples_split || depth_exhausted {
            return TreeNode::Leaf { value: mean };
        }

        let Some((feature, threshold)) = self.best_split(&indices) else {
            return TreeNode::Leaf { value: mean };
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[i][feature] <= threshold);

        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(self.grow(left, depth + 1)),
            right: Box::new(self.grow(right, depth + 1)),
        }
    }

    /// The (feature, threshold) pair minimizing the children's summed
    /// squared error, or `None` when no split satisfies the leaf minimum.
    fn best_split(&mut self, indices: &[usize]) -> Option<(usize, f64)> {
        // ---
        let n_features = self.x.first().map_or(0, Vec::len);
        let candidates = self.candidate_features(n_features);

        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<(usize, f64, f64)> = None; // (feature, threshold, score)

        for feature in candidates {
            let mut ordered: Vec<(f64, f64)> = indices
                .iter()
                .map(|&i| (self.x[i][feature], self.y[i]))
                .collect();
            ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

            // Prefix sums over the sorted targets let each split position
            // score in O(1).
            let mut sum = 0.0;
            let mut sum_sq = 0.0;
            let prefix: Vec<(f64, f64)> = ordered
                .iter()
                .map(|(_, t)| {
                    sum += t;
                    sum_sq += t * t;
                    (sum, sum_sq)
                })
                .collect();
            let (total, total_sq) = (sum, sum_sq);
            let n = ordered.len();

            for split in min_leaf..=(n.saturating_sub(min_leaf)) {
                if split == 0 || split >= n {
                    continue;
                }
                // No split between equal feature values.
                if ordered[split].0 <= ordered[split - 1].0 {
                    continue;
                }
                let (left_sum, left_sq) = prefix[split - 1];
                let right_sum = total - left_sum;
                let right_sq = total_sq - left_sq;
                let left_n = split as f64;
                let right_n = (n - split) as f64;
                let score = (left_sq - left_sum * left_sum / left_n)
                    + (right_sq - right_sum * right_sum / right_n);

                if best.map_or(true, |(_, _, s)| score < s) {
                    let threshold = (ordered[split - 1].0 + ordered[split].0) / 2.0;
                    best = Some((feature, threshold, score));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }

    fn candidate_features(&mut self, n_features: usize) -> Vec<usize> {
        // ---
        let mut all: Vec<usize> = (0..n_features).collect();
        match self.params.feature_sampling {
            FeatureSampling::All => all,
            FeatureSampling::Sqrt => {
                let take = ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features);
                all.shuffle(self.rng);
                all.truncate(take);
                all
            }
        }
    }
}

// ---

/// The bootstrap-aggregated ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    // ---
    /// Fit `params.n_trees` trees, each on a bootstrap sample drawn with the
    /// given seed. The same inputs and seed reproduce the same forest.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: ForestParams, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = x.len();
        if n == 0 {
            return Self {
                params,
                trees: Vec::new(),
            };
        }

        let trees = (0..params.n_trees)
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, y, &sample, &params, &mut rng)
            })
            .collect();

        Self { params, trees }
    }

    /// Mean of the per-tree predictions.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        // ---
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees
            .iter()
            .map(|t| t.predict_row(row))
            .sum::<f64>()
            / self.trees.len() as f64
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }
}

// ---
