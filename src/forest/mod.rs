//! Bagged ensemble of linfa decision trees.
//!
//! Each member is a Gini CART tree fit on a bootstrap resample of the rows
//! and a random subset of the feature columns. Class probabilities are the
//! share of member votes.

use linfa::{
    traits::{Fit, Predict},
    Dataset,
};
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2};
use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{PredictorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Share of feature columns each tree is fit on, in `(0, 1]`.
    pub feature_subsample: f64,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(10),
            min_samples_split: 5,
            min_samples_leaf: 2,
            feature_subsample: 0.7,
            seed: 42,
        }
    }
}

/// One ensemble member and the full-row columns it reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaggedTree {
    features: Vec<usize>,
    tree: DecisionTree<f64, usize>,
}

impl BaggedTree {
    /// Ascending column indices into the full feature row.
    pub fn features(&self) -> &[usize] {
        &self.features
    }

    pub fn tree(&self) -> &DecisionTree<f64, usize> {
        &self.tree
    }

    fn vote(&self, row: &[f64]) -> Result<usize> {
        let sub = self
            .features
            .iter()
            .map(|&f| {
                row.get(f).copied().ok_or_else(|| {
                    PredictorError::Prediction(format!("tree reads column {f} past the row end"))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        let x = Array2::from_shape_vec((1, sub.len()), sub)
            .map_err(|e| PredictorError::Prediction(e.to_string()))?;
        let pred: Array1<usize> = self.tree.predict(&x);
        pred.first()
            .copied()
            .ok_or_else(|| PredictorError::Prediction("tree returned no prediction".into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    n_classes: usize,
    trees: Vec<BaggedTree>,
}

impl RandomForest {
    pub fn fit(params: ForestParams, x: &[Vec<f64>], y: &[usize]) -> Result<Self> {
        if x.is_empty() {
            return Err(PredictorError::Training("empty training set".into()));
        }
        if x.len() != y.len() {
            return Err(PredictorError::Training(format!(
                "{} rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        if params.n_estimators == 0 {
            return Err(PredictorError::Training("n_estimators must be positive".into()));
        }
        if !(params.feature_subsample > 0.0 && params.feature_subsample <= 1.0) {
            return Err(PredictorError::Training(format!(
                "feature_subsample {} is outside (0, 1]",
                params.feature_subsample
            )));
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|row| row.len() != n_features) {
            return Err(PredictorError::Training("ragged or empty feature rows".into()));
        }
        if x.iter().flatten().any(|v| !v.is_finite()) {
            return Err(PredictorError::Training("non-finite feature value".into()));
        }
        let n_classes = y.iter().copied().max().unwrap_or(0) + 1;

        let per_tree = ((n_features as f64 * params.feature_subsample).ceil() as usize)
            .clamp(1, n_features);
        let tree_params = DecisionTree::<f64, usize>::params()
            .split_quality(SplitQuality::Gini)
            .max_depth(params.max_depth)
            .min_weight_split(params.min_samples_split.max(2) as f32)
            .min_weight_leaf(params.min_samples_leaf.max(1) as f32);

        let n = x.len();
        let trees = (0..params.n_estimators)
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(i as u64));
                let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut features = index::sample(&mut rng, n_features, per_tree).into_vec();
                features.sort_unstable();

                let records =
                    Array2::from_shape_fn((n, features.len()), |(r, c)| x[rows[r]][features[c]]);
                let targets = Array1::from(rows.iter().map(|&r| y[r]).collect::<Vec<_>>());
                let tree = tree_params
                    .fit(&Dataset::new(records, targets))
                    .map_err(|e| PredictorError::Training(format!("tree {i}: {e}")))?;
                Ok(BaggedTree { features, tree })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            params,
            n_features,
            n_classes,
            trees,
        })
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn trees(&self) -> &[BaggedTree] {
        &self.trees
    }

    /// Structural check for a deserialized forest: every column a tree reads
    /// and every class a leaf predicts must fit the declared shape.
    pub fn check_shape(&self) -> Result<()> {
        let bad = |msg: String| Err(PredictorError::Prediction(msg));
        if self.trees.is_empty() {
            return bad("forest has no trees".into());
        }
        if self.n_classes < 2 {
            return bad(format!("forest declares {} classes", self.n_classes));
        }
        for (i, member) in self.trees.iter().enumerate() {
            if member.features.is_empty() {
                return bad(format!("tree {i} reads no columns"));
            }
            if let Some(f) = member.features.iter().find(|&&f| f >= self.n_features) {
                return bad(format!(
                    "tree {i} reads column {f}, forest has {} features",
                    self.n_features
                ));
            }
            for node in member.tree.iter_nodes() {
                if node.is_leaf() {
                    match node.prediction() {
                        Some(class) if class < self.n_classes => {}
                        other => return bad(format!("tree {i} has a leaf predicting {other:?}")),
                    }
                } else {
                    let (feature, _, _) = node.split();
                    if feature >= member.features.len() {
                        return bad(format!(
                            "tree {i} splits on local column {feature} of {}",
                            member.features.len()
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Class probabilities for one row; entries sum to 1.
    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
        self.check_row(row)?;
        if self.trees.is_empty() {
            return Err(PredictorError::Prediction("forest has no trees".into()));
        }
        let mut votes = vec![0usize; self.n_classes];
        for member in &self.trees {
            let class = member.vote(row)?;
            let slot = votes.get_mut(class).ok_or_else(|| {
                PredictorError::Prediction(format!("tree voted for unknown class {class}"))
            })?;
            *slot += 1;
        }
        let total = self.trees.len() as f64;
        Ok(votes.into_iter().map(|v| v as f64 / total).collect())
    }

    /// Most probable class; ties go to the lower class index.
    pub fn predict(&self, row: &[f64]) -> Result<usize> {
        let proba = self.predict_proba(row)?;
        Ok(argmax(&proba))
    }

    /// Binary convenience: `(class, p_death, p_survival)`.
    pub fn predict_binary(&self, row: &[f64]) -> Result<(usize, f64, f64)> {
        if self.n_classes != 2 {
            return Err(PredictorError::Prediction(format!(
                "expected a binary classifier, model has {} classes",
                self.n_classes
            )));
        }
        let proba = self.predict_proba(row)?;
        Ok((argmax(&proba), proba[0], proba[1]))
    }

    pub fn predict_many(&self, rows: &[Vec<f64>]) -> Result<Vec<usize>> {
        rows.iter().map(|r| self.predict(r)).collect()
    }

    /// Mean impurity-decrease importance per feature, summing to 1.
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.n_features];
        for member in &self.trees {
            for (&f, v) in member.features.iter().zip(member.tree.feature_importance()) {
                // A tree that never split reports NaN shares.
                if v.is_finite() {
                    total[f] += v;
                }
            }
        }
        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            total.iter_mut().for_each(|v| *v /= sum);
        }
        total
    }

    fn check_row(&self, row: &[f64]) -> Result<()> {
        if row.len() != self.n_features {
            return Err(PredictorError::Prediction(format!(
                "feature length mismatch: got {}, expected {}",
                row.len(),
                self.n_features
            )));
        }
        if let Some(pos) = row.iter().position(|v| !v.is_finite()) {
            return Err(PredictorError::Prediction(format!(
                "feature {pos} is not a finite number"
            )));
        }
        Ok(())
    }
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
