//! Isolation Forest anomaly detection
//!
//! Each tree recursively partitions a random subsample with random
//! axis-aligned splits. Anomalies sit in sparse regions and are isolated in
//! few splits, so their average path length over the forest is short:
//! `s(x) = 2^(-E[h(x)] / c(n))`.

use crate::anomaly::AnomalyDetector;
use crate::error::{AnomalyError, Result};
use crate::utils::parallel::{run_in_pool, ParallelConfig};
use crate::utils::stats::quantile;
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Euler-Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Subsample size used by `MaxSamples::Auto`
const AUTO_MAX_SAMPLES: usize = 256;

/// Expected path length of an unsuccessful search in a random binary search
/// tree over `n` points:
/// `c(n) = 2 * (ln(n - 1) + gamma) - 2 * (n - 1) / n` for `n > 1`, else 0.
pub fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
}

/// Number of rows drawn (without replacement) for each tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxSamples {
    /// `min(256, n_rows)`
    Auto,
    /// Fixed count, clipped to the number of rows
    Count(usize),
    /// Fraction of the rows
    Fraction(f64),
}

impl MaxSamples {
    /// Concrete subsample size for a matrix with `n_rows` rows
    pub fn resolve(&self, n_rows: usize) -> usize {
        let size = match *self {
            MaxSamples::Auto => AUTO_MAX_SAMPLES,
            MaxSamples::Count(n) => n,
            MaxSamples::Fraction(f) => (f * n_rows as f64) as usize,
        };
        size.clamp(1, n_rows.max(1))
    }
}

/// Expected share of anomalies among the training rows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Contamination {
    /// Fixed decision threshold of 0.5
    Auto,
    /// Threshold at the `(1 - c)` quantile of training scores
    Fraction(f64),
}

/// Isolation Tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IsolationTree {
    /// Internal node with split
    Internal {
        /// Feature index for split
        feature: usize,
        /// Split threshold
        threshold: f64,
        /// Left subtree (values < threshold)
        left: Box<IsolationTree>,
        /// Right subtree (values >= threshold)
        right: Box<IsolationTree>,
    },
    /// External (leaf) node
    External {
        /// Depth at which the node was closed
        depth: usize,
        /// Number of training samples in this node
        size: usize,
    },
}

impl IsolationTree {
    /// Build an isolation tree over the rows `indices` of `x`.
    ///
    /// The split feature is drawn among the features that are not constant
    /// on the current rows; the threshold uniformly in `[min, max)`.
    pub fn build(
        x: &Array2<f64>,
        indices: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut impl Rng,
    ) -> Self {
        let n_samples = indices.len();
        if depth >= max_depth || n_samples <= 1 {
            return IsolationTree::External { depth, size: n_samples };
        }

        let candidates: Vec<(usize, f64, f64)> = (0..x.ncols())
            .filter_map(|feature| {
                let (min, max) = indices.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), &i| {
                        let v = x[[i, feature]];
                        (lo.min(v), hi.max(v))
                    },
                );
                // Overflowing ranges cannot be sampled from
                (max > min && (max - min).is_finite()).then_some((feature, min, max))
            })
            .collect();

        // Every remaining row is identical
        if candidates.is_empty() {
            return IsolationTree::External { depth, size: n_samples };
        }

        let (feature, min_val, max_val) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(min_val..max_val);

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature]] < threshold);

        // threshold == min leaves the left side empty
        if left_indices.is_empty() || right_indices.is_empty() {
            return IsolationTree::External { depth, size: n_samples };
        }

        let left = Box::new(Self::build(x, &left_indices, depth + 1, max_depth, rng));
        let right = Box::new(Self::build(x, &right_indices, depth + 1, max_depth, rng));

        IsolationTree::Internal {
            feature,
            threshold,
            left,
            right,
        }
    }

    /// Path length `h(x)`: depth of the reached leaf plus `c(size)` for the
    /// points that leaf still holds.
    pub fn path_length(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                IsolationTree::External { depth, size } => {
                    return *depth as f64 + average_path_length(*size);
                }
                IsolationTree::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] < *threshold { left } else { right };
                }
            }
        }
    }

    /// Maximum leaf depth
    pub fn height(&self) -> usize {
        match self {
            IsolationTree::External { depth, .. } => *depth,
            IsolationTree::Internal { left, right, .. } => left.height().max(right.height()),
        }
    }

    /// Total number of training samples across leaves
    pub fn n_samples(&self) -> usize {
        match self {
            IsolationTree::External { size, .. } => *size,
            IsolationTree::Internal { left, right, .. } => left.n_samples() + right.n_samples(),
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            IsolationTree::External { .. } => 1,
            IsolationTree::Internal { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// A fitted forest. Immutable; safe to share across scoring threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForestModel {
    trees: Vec<IsolationTree>,
    n_features: usize,
    subsample_size: usize,
    expected_path_length: f64,
    contamination: Contamination,
    threshold: f64,
}

impl IsolationForestModel {
    pub fn trees(&self) -> &[IsolationTree] {
        &self.trees
    }

    /// Column count seen at fit time
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Rows drawn for each tree
    pub fn subsample_size(&self) -> usize {
        self.subsample_size
    }

    /// `c(n)` for the subsample size
    pub fn expected_path_length(&self) -> f64 {
        self.expected_path_length
    }

    pub fn contamination(&self) -> Contamination {
        self.contamination
    }

    /// Scores strictly above this value are flagged
    pub fn decision_threshold(&self) -> f64 {
        self.threshold
    }

    /// Anomaly score in (0, 1] per row; higher is more anomalous
    pub fn score(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(AnomalyError::columns(self.n_features, x.ncols()));
        }

        // A forest fit on one row has c(n) = 0 and every path is 0 long
        let normalizer = if self.expected_path_length > 0.0 {
            self.expected_path_length
        } else {
            1.0
        };
        let n_trees = self.trees.len() as f64;

        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let sample = x.row(i);
                let avg_path_length = self
                    .trees
                    .iter()
                    .map(|tree| tree.path_length(sample))
                    .sum::<f64>()
                    / n_trees;
                2.0_f64.powf(-avg_path_length / normalizer)
            })
            .collect();

        Ok(Array1::from_vec(scores))
    }

    /// Flags for already-computed scores
    pub fn flag(&self, scores: &Array1<f64>) -> Array1<bool> {
        scores.mapv(|s| s > self.threshold)
    }

    /// Score and flag in one step
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<bool>> {
        Ok(self.flag(&self.score(x)?))
    }
}

/// Isolation Forest anomaly detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Number of trees
    n_estimators: usize,
    /// Rows per tree
    max_samples: MaxSamples,
    /// Contamination ratio (expected proportion of outliers)
    contamination: Contamination,
    /// Random seed
    seed: Option<u64>,
    /// Worker threads for building and scoring
    parallel: ParallelConfig,
    /// Fitted forest
    model: Option<IsolationForestModel>,
}

impl IsolationForest {
    /// Create new Isolation Forest
    pub fn new() -> Self {
        Self {
            n_estimators: 300,
            max_samples: MaxSamples::Auto,
            contamination: Contamination::Fraction(0.02),
            seed: None,
            parallel: ParallelConfig::default(),
            model: None,
        }
    }

    /// Set number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    /// Set rows per tree
    pub fn with_max_samples(mut self, max_samples: MaxSamples) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Set contamination; fractions are clamped to (0, 0.5] and NaN is
    /// rejected at fit time
    pub fn with_contamination(mut self, contamination: Contamination) -> Self {
        self.contamination = match contamination {
            Contamination::Fraction(c) => Contamination::Fraction(c.clamp(f64::EPSILON, 0.5)),
            Contamination::Auto => Contamination::Auto,
        };
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Bound the number of worker threads
    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.parallel = ParallelConfig::new().with_threads(n_jobs.max(1));
        self
    }

    /// The fitted forest, or `UnfittedState`
    pub fn model(&self) -> Result<&IsolationForestModel> {
        self.model
            .as_ref()
            .ok_or_else(|| AnomalyError::UnfittedState("IsolationForest has not been fit".to_string()))
    }

    /// Consume the detector and return the fitted forest
    pub fn into_model(self) -> Result<IsolationForestModel> {
        self.model
            .ok_or_else(|| AnomalyError::UnfittedState("IsolationForest has not been fit".to_string()))
    }

    /// Build the forest on `x` and derive the decision threshold from the
    /// training scores.
    pub fn fit_model(&mut self, x: &Array2<f64>) -> Result<&IsolationForestModel> {
        let n_rows = x.nrows();
        if n_rows == 0 {
            return Err(AnomalyError::EmptyDataset(
                "cannot fit isolation forest on a matrix with zero rows".to_string(),
            ));
        }
        if let Contamination::Fraction(c) = self.contamination {
            if c.is_nan() {
                return Err(AnomalyError::InvalidParameter {
                    name: "contamination".to_string(),
                    value: c.to_string(),
                    reason: "must be in (0, 0.5]".to_string(),
                });
            }
        }

        let subsample_size = self.max_samples.resolve(n_rows);
        let max_depth = (subsample_size as f64).log2().ceil() as usize;

        let mut rng = match self.seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::seed_from_u64(rand::thread_rng().gen()),
        };
        // One independent stream per tree keeps the forest identical for any
        // thread count
        let tree_seeds: Vec<u64> = (0..self.n_estimators).map(|_| rng.gen()).collect();

        let trees: Vec<IsolationTree> = run_in_pool(&self.parallel, || {
            tree_seeds
                .par_iter()
                .map(|&seed| {
                    let mut tree_rng = Xoshiro256PlusPlus::seed_from_u64(seed);
                    let indices = rand::seq::index::sample(&mut tree_rng, n_rows, subsample_size).into_vec();
                    IsolationTree::build(x, &indices, 0, max_depth, &mut tree_rng)
                })
                .collect()
        })?;

        let mut model = IsolationForestModel {
            trees,
            n_features: x.ncols(),
            subsample_size,
            expected_path_length: average_path_length(subsample_size),
            contamination: self.contamination,
            threshold: 0.5,
        };

        if let Contamination::Fraction(c) = self.contamination {
            let scores = run_in_pool(&self.parallel, || model.score(x))??;
            let scores = scores.to_vec();
            model.threshold = quantile(&scores, 1.0 - c).unwrap_or(0.5);
        }

        debug!(
            max_depth,
            leaves = model.trees.iter().map(IsolationTree::n_leaves).sum::<usize>(),
            "Isolation trees built"
        );
        info!(
            trees = model.trees.len(),
            rows = n_rows,
            subsample_size,
            threshold = model.threshold,
            "Fitted isolation forest"
        );

        Ok(self.model.insert(model))
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyDetector for IsolationForest {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        self.fit_model(x).map(|_| ())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let model = self.model()?;
        run_in_pool(&self.parallel, || model.score(x))?
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<bool>> {
        let model = self.model()?;
        Ok(model.flag(&self.score_samples(x)?))
    }

    fn threshold(&self) -> Result<f64> {
        Ok(self.model()?.decision_threshold())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn cluster_with_outliers() -> Array2<f64> {
        // Normal data cluster: 50 points with 2 features each
        let mut data = Vec::new();
        for i in 0..50 {
            data.push((i % 10) as f64);
            data.push(((i % 7) + 1) as f64);
        }
        // Add 2 outliers
        data.extend_from_slice(&[100.0, 100.0]);
        data.extend_from_slice(&[-50.0, -50.0]);
        Array2::from_shape_vec((52, 2), data).unwrap()
    }

    #[test]
    fn test_isolation_forest_basic() {
        let x = cluster_with_outliers();
        let mut iforest = IsolationForest::new()
            .with_n_estimators(100)
            .with_contamination(Contamination::Fraction(0.05))
            .with_seed(42);

        iforest.fit(&x).unwrap();

        let scores = iforest.score_samples(&x).unwrap();
        let flags = iforest.predict(&x).unwrap();

        assert!(scores[50] > scores[0]);
        assert!(scores[51] > scores[0]);
        assert!(flags[50]);
        assert!(flags[51]);
        assert!(scores.iter().all(|&s| s > 0.0 && s <= 1.0));
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert!((average_path_length(2) - 0.154_431_329_803_065_7).abs() < 1e-12);
        assert!((average_path_length(256) - 10.244_770_920_119_917).abs() < 1e-9);
    }

    #[test]
    fn test_max_samples_resolve() {
        assert_eq!(MaxSamples::Auto.resolve(1000), 256);
        assert_eq!(MaxSamples::Auto.resolve(100), 100);
        assert_eq!(MaxSamples::Count(10_000).resolve(50), 50);
        assert_eq!(MaxSamples::Fraction(0.5).resolve(50), 25);
        assert_eq!(MaxSamples::Fraction(0.0001).resolve(50), 1);
    }

    #[test]
    fn test_isolation_tree_path_length() {
        let x = Array2::from_shape_vec(
            (10, 2),
            vec![
                1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0, 5.0, 5.0,
                6.0, 6.0, 7.0, 7.0, 8.0, 8.0, 9.0, 9.0, 10.0, 10.0,
            ],
        )
        .unwrap();

        let indices: Vec<usize> = (0..10).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let tree = IsolationTree::build(&x, &indices, 0, 4, &mut rng);

        assert_eq!(tree.n_samples(), 10);
        assert!(tree.height() <= 4);
        let path = tree.path_length(array![5.0, 5.0].view());
        assert!(path > 0.0);
    }

    #[test]
    fn test_identical_rows_make_single_leaf() {
        let x = Array2::from_elem((8, 3), 1.5);
        let indices: Vec<usize> = (0..8).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let tree = IsolationTree::build(&x, &indices, 0, 3, &mut rng);
        assert_eq!(tree, IsolationTree::External { depth: 0, size: 8 });
    }

    #[test]
    fn test_constant_feature_never_split() {
        let mut x = Array2::zeros((64, 2));
        for i in 0..64 {
            x[[i, 1]] = i as f64;
        }
        let mut iforest = IsolationForest::new().with_n_estimators(20).with_seed(3);
        let model = iforest.fit_model(&x).unwrap();

        fn features(tree: &IsolationTree, out: &mut Vec<usize>) {
            if let IsolationTree::Internal { feature, left, right, .. } = tree {
                out.push(*feature);
                features(left, out);
                features(right, out);
            }
        }
        let mut used = Vec::new();
        for tree in model.trees() {
            features(tree, &mut used);
        }
        assert!(!used.is_empty());
        assert!(used.iter().all(|&f| f == 1));
    }

    #[test]
    fn test_deterministic_with_seed_and_threads() {
        let x = cluster_with_outliers();
        let mut a = IsolationForest::new().with_n_estimators(30).with_seed(11).with_n_jobs(1);
        let mut b = IsolationForest::new().with_n_estimators(30).with_seed(11).with_n_jobs(4);
        a.fit(&x).unwrap();
        b.fit(&x).unwrap();
        assert_eq!(a.model().unwrap(), b.model().unwrap());

        let sa = a.score_samples(&x).unwrap();
        let sb = b.score_samples(&x).unwrap();
        for (p, q) in sa.iter().zip(sb.iter()) {
            assert_eq!(p.to_bits(), q.to_bits());
        }
    }

    #[test]
    fn test_height_limit() {
        let x = Array2::from_shape_fn((500, 3), |(i, j)| ((i * 31 + j * 17) % 97) as f64);
        let mut iforest = IsolationForest::new()
            .with_n_estimators(10)
            .with_max_samples(MaxSamples::Count(64))
            .with_seed(5);
        let model = iforest.fit_model(&x).unwrap();
        assert_eq!(model.subsample_size(), 64);
        for tree in model.trees() {
            assert!(tree.height() <= 6);
            assert_eq!(tree.n_samples(), 64);
        }
    }

    #[test]
    fn test_unfitted_and_empty() {
        let iforest = IsolationForest::new();
        assert!(matches!(
            iforest.score_samples(&array![[1.0]]).unwrap_err(),
            AnomalyError::UnfittedState(_)
        ));
        assert!(iforest.threshold().is_err());

        let mut iforest = IsolationForest::new();
        assert!(matches!(
            iforest.fit(&Array2::zeros((0, 4))).unwrap_err(),
            AnomalyError::EmptyDataset(_)
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut iforest = IsolationForest::new().with_n_estimators(5).with_seed(1);
        iforest.fit(&cluster_with_outliers()).unwrap();
        let err = iforest.score_samples(&Array2::zeros((3, 5))).unwrap_err();
        assert!(matches!(err, AnomalyError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_single_row_forest_scores_one() {
        let x = array![[1.0, 2.0]];
        let mut iforest = IsolationForest::new().with_n_estimators(5).with_seed(1);
        iforest.fit(&x).unwrap();
        let scores = iforest.score_samples(&array![[1.0, 2.0], [9.0, 9.0]]).unwrap();
        assert_eq!(scores[0], 1.0);
        assert_eq!(scores[1], 1.0);
    }

    #[test]
    fn test_auto_contamination_threshold() {
        let mut iforest = IsolationForest::new()
            .with_n_estimators(10)
            .with_contamination(Contamination::Auto)
            .with_seed(2);
        iforest.fit(&cluster_with_outliers()).unwrap();
        assert_eq!(iforest.threshold().unwrap(), 0.5);
    }

    #[test]
    fn test_nan_contamination_rejected() {
        let mut iforest = IsolationForest::new()
            .with_n_estimators(5)
            .with_contamination(Contamination::Fraction(f64::NAN));
        let err = iforest.fit(&cluster_with_outliers()).unwrap_err();
        assert!(matches!(err, AnomalyError::InvalidParameter { .. }));
        assert!(iforest.model().is_err());
    }

    #[test]
    fn test_non_finite_and_overflowing_columns() {
        let mut x = cluster_with_outliers();
        x[[0, 0]] = 1e308;
        x[[1, 0]] = -1e308;
        let mut iforest = IsolationForest::new().with_n_estimators(20).with_seed(4);
        let model = iforest.fit_model(&x).unwrap();
        assert!(model.trees().iter().any(|t| t.n_leaves() > 1));
        let scores = iforest.score_samples(&x).unwrap();
        assert!(scores.iter().all(|&s| s > 0.0 && s <= 1.0));

        // A column with infinities is never split where they are present
        x[[2, 1]] = f64::INFINITY;
        x[[3, 1]] = f64::NEG_INFINITY;
        let mut iforest = IsolationForest::new().with_n_estimators(20).with_seed(4);
        iforest.fit(&x).unwrap();
        let scores = iforest.score_samples(&x).unwrap();
        assert!(scores.iter().all(|&s| s > 0.0 && s <= 1.0));
    }

    #[test]
    fn test_fit_predict_matches_model_predict() {
        let x = cluster_with_outliers();
        let mut iforest = IsolationForest::new()
            .with_n_estimators(50)
            .with_contamination(Contamination::Fraction(0.05))
            .with_seed(8);
        let flags = iforest.fit_predict(&x).unwrap();
        let model = iforest.model().unwrap();
        assert_eq!(flags, model.predict(&x).unwrap());
        assert_eq!(flags, model.flag(&model.score(&x).unwrap()));
    }
}
