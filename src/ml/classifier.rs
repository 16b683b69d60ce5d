use crate::config::TrainingConfig;
use crate::error::{AppError, Result};
use crate::ml::models::ModelType;
use crate::ml::tree::{DecisionTree, TreeParams};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Trait for classifiers
pub trait Classifier: Send + Sync + std::fmt::Debug {
    /// Predict class probabilities, one row per input row in label-encoder order
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>>;

    /// Predict class indices (argmax of the probabilities, first on ties)
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(features)?;
        Ok(proba.rows().into_iter().map(|row| argmax(row.iter().copied())).collect())
    }

    /// Number of classes
    fn n_classes(&self) -> usize;

    /// Number of input features
    fn n_features(&self) -> usize;

    /// Get model type
    fn model_type(&self) -> ModelType;
}

/// Index of the largest value, the first one on ties
pub fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (index, value) in values.enumerate() {
        if value > best_value {
            best = index;
            best_value = value;
        }
    }
    best
}

/// Random forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

impl From<&TrainingConfig> for ForestParams {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            n_trees: config.n_trees,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            seed: config.seed,
        }
    }
}

impl ForestParams {
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("n_trees".to_string(), self.n_trees.to_string());
        map.insert(
            "max_depth".to_string(),
            self.max_depth
                .map(|d| d.to_string())
                .unwrap_or_else(|| "none".to_string()),
        );
        map.insert(
            "min_samples_split".to_string(),
            self.min_samples_split.to_string(),
        );
        map.insert(
            "min_samples_leaf".to_string(),
            self.min_samples_leaf.to_string(),
        );
        map.insert("max_features".to_string(), "sqrt".to_string());
        map.insert("criterion".to_string(), "gini".to_string());
        map.insert("seed".to_string(), self.seed.to_string());
        map
    }
}

/// Bagged ensemble of Gini decision trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
    n_classes: usize,
    params: ForestParams,

    /// Mean normalized impurity decrease per feature
    #[serde(default)]
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fit on `x` with class indices `y` in `0..n_classes`
    pub fn fit(x: &Array2<f64>, y: &[usize], n_classes: usize, params: &ForestParams) -> Result<Self> {
        let (n_samples, n_features) = x.dim();

        if n_samples == 0 || n_features == 0 {
            return Err(AppError::Training("empty training matrix".to_string()));
        }
        if y.len() != n_samples {
            return Err(AppError::Training(format!(
                "{} labels for {} rows",
                y.len(),
                n_samples
            )));
        }
        if params.n_trees == 0 {
            return Err(AppError::Training("n_trees must be at least 1".to_string()));
        }
        if let Some(&bad) = y.iter().find(|&&class| class >= n_classes) {
            return Err(AppError::Training(format!(
                "label index {} outside 0..{}",
                bad, n_classes
            )));
        }

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: Some(((n_features as f64).sqrt().floor() as usize).max(1)),
        };

        info!(
            n_samples,
            n_features,
            n_classes,
            n_trees = params.n_trees,
            "Fitting random forest"
        );

        let trees: Vec<DecisionTree> = (0..params.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(t as u64));
                let bootstrap: Vec<usize> =
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                DecisionTree::fit(x, y, n_classes, bootstrap, &tree_params, &mut rng)
            })
            .collect();

        let mut importances = vec![0.0; n_features];
        for tree in &trees {
            let total: f64 = tree.importances().iter().sum();
            if total > 0.0 {
                for (acc, value) in importances.iter_mut().zip(tree.importances()) {
                    *acc += value / total;
                }
            }
        }
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        debug!(
            max_depth = trees.iter().map(DecisionTree::depth).max().unwrap_or(0),
            "Random forest fitted"
        );

        Ok(Self {
            trees,
            n_features,
            n_classes,
            params: *params,
            feature_importances: importances,
        })
    }

    /// Assemble from pre-built trees
    pub fn from_trees(trees: Vec<DecisionTree>, params: ForestParams) -> Result<Self> {
        let (n_features, n_classes) = trees
            .first()
            .map(|tree| (tree.n_features(), tree.n_classes()))
            .ok_or_else(|| AppError::ArtifactLoad("random forest has no trees".to_string()))?;
        let forest = Self {
            trees,
            n_features,
            n_classes,
            params,
            feature_importances: vec![0.0; n_features],
        };
        forest.validate()?;
        Ok(forest)
    }

    /// Structural integrity check run on every load
    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(AppError::ArtifactLoad("random forest has no trees".to_string()));
        }
        if self.n_classes == 0 {
            return Err(AppError::ArtifactLoad("random forest has no classes".to_string()));
        }

        for (index, tree) in self.trees.iter().enumerate() {
            if tree.n_features() != self.n_features || tree.n_classes() != self.n_classes {
                return Err(AppError::ArtifactLoad(format!(
                    "tree {} shape ({} features, {} classes) differs from forest ({}, {})",
                    index,
                    tree.n_features(),
                    tree.n_classes(),
                    self.n_features,
                    self.n_classes
                )));
            }
            tree.validate()?;
        }

        Ok(())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

impl Classifier for RandomForest {
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if features.ncols() != self.n_features {
            return Err(AppError::Inference(format!(
                "expected {} features, got {}",
                self.n_features,
                features.ncols()
            )));
        }

        let mut proba = Array2::<f64>::zeros((features.nrows(), self.n_classes));
        for (row, mut out) in features.rows().into_iter().zip(proba.rows_mut()) {
            for tree in &self.trees {
                for (acc, p) in out.iter_mut().zip(tree.predict_row(row)) {
                    *acc += p;
                }
            }
        }
        proba /= self.trees.len() as f64;

        Ok(proba)
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn model_type(&self) -> ModelType {
        ModelType::RandomForest
    }
}
