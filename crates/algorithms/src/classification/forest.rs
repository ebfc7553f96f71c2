//! Seeded random forest
//!
//! Bagged CART trees with a random feature subset at every split. Tree `i`
//! draws its bootstrap and feature subsets from `StdRng::seed_from_u64(seed ^ i)`,
//! so a forest is identical whether its trees are grown in parallel or not.

use super::metrics::{ConfusionMatrix, ValidationReport};
use super::tree::{DecisionTree, TrainingData, TreeParams};
use crate::bands::FeatureName;
use crate::features::{join_names, FeatureStack};
use crate::maybe_rayon::*;
use crate::sampling::SampleSet;
use paddyscan_core::raster::Raster;
use paddyscan_core::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Class value written for pixels without a complete feature vector
pub const CLASS_NODATA: u8 = u8::MAX;

/// Parameters for random forest training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees (default 350)
    pub trees: usize,
    /// Features considered at each split (default 5)
    pub variables_per_split: usize,
    /// Minimum samples in each child of a split (default 10)
    pub min_leaf_population: usize,
    /// Bootstrap size as a fraction of the training set (default 0.8)
    pub bag_fraction: f64,
    pub max_depth: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            trees: 350,
            variables_per_split: 5,
            min_leaf_population: 10,
            bag_fraction: 0.8,
            max_depth: None,
            seed: 42,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<()> {
        if self.trees == 0 {
            return Err(Error::config("trees", "must be at least 1"));
        }
        if self.variables_per_split == 0 {
            return Err(Error::config("variables_per_split", "must be at least 1"));
        }
        if self.min_leaf_population == 0 {
            return Err(Error::config("min_leaf_population", "must be at least 1"));
        }
        if !(self.bag_fraction > 0.0 && self.bag_fraction <= 1.0) {
            return Err(Error::config(
                "bag_fraction",
                format!("{} is outside (0, 1]", self.bag_fraction),
            ));
        }
        Ok(())
    }
}

/// Random forest trainer
#[derive(Debug, Clone, Default)]
pub struct RandomForest {
    params: ForestParams,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Grow the forest on `train`
    pub fn fit(&self, train: &SampleSet) -> Result<TrainedModel> {
        if train.is_empty() {
            return Err(Error::no_data("training", "train partition is empty"));
        }
        let n_features = train.feature_names().len();
        if n_features == 0 {
            return Err(Error::no_data("training", "samples carry no features"));
        }

        let rows: Vec<&[f64]> = train.iter().map(|s| s.features.as_slice()).collect();
        let labels: Vec<u8> = train.iter().map(|s| s.label).collect();
        let data = TrainingData {
            rows: &rows,
            labels: &labels,
            n_features,
        };

        let n = rows.len();
        let bag = ((self.params.bag_fraction * n as f64).round() as usize).max(1);
        let tree_params = TreeParams {
            variables_per_split: self.params.variables_per_split,
            min_leaf_population: self.params.min_leaf_population,
            max_depth: self.params.max_depth,
        };
        let seed = self.params.seed;

        let trees: Vec<DecisionTree> = (0..self.params.trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(seed ^ i as u64);
                let bootstrap: Vec<usize> = (0..bag).map(|_| rng.gen_range(0..n)).collect();
                let tree = DecisionTree::fit(&data, bootstrap, &tree_params, &mut rng);
                debug!("tree {} grown, depth {}", i, tree.depth());
                tree
            })
            .collect();

        let mut importance = vec![0.0; n_features];
        for tree in &trees {
            for (acc, v) in importance.iter_mut().zip(tree.importance()) {
                *acc += v;
            }
        }
        let sum: f64 = importance.iter().sum();
        if sum > 0.0 {
            importance.iter_mut().for_each(|v| *v /= sum);
        }

        info!(
            "Random forest: {} trees on {} samples (bootstrap {}, {} features)",
            trees.len(),
            n,
            bag,
            n_features
        );
        Ok(TrainedModel {
            feature_names: train.feature_names().to_vec(),
            trees,
            importance,
        })
    }
}

/// Per-pixel classifier outputs
#[derive(Debug, Clone)]
pub struct Classification {
    /// 1 paddy, 0 background, [`CLASS_NODATA`] where features are missing
    pub classes: Raster<u8>,
    /// Mean class-1 posterior over the trees, NaN where features are missing
    pub probability: Raster<f64>,
}

/// A fitted forest bound to the feature order it was trained on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    feature_names: Vec<FeatureName>,
    trees: Vec<DecisionTree>,
    importance: Vec<f64>,
}

impl TrainedModel {
    pub fn feature_names(&self) -> &[FeatureName] {
        &self.feature_names
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Fail unless `names` is exactly the training feature order
    pub fn check_features(&self, names: &[FeatureName]) -> Result<()> {
        if names != self.feature_names.as_slice() {
            return Err(Error::FeatureMismatch {
                expected: join_names(&self.feature_names),
                actual: join_names(names),
            });
        }
        Ok(())
    }

    /// Mean class-1 posterior over all trees
    pub fn probability(&self, features: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.posterior(features)).sum();
        sum / self.trees.len() as f64
    }

    /// Majority vote; class 1 needs more than half of the trees
    pub fn predict(&self, features: &[f64]) -> u8 {
        let votes = self.trees.iter().filter(|t| t.predict(features) == 1).count();
        u8::from(votes * 2 > self.trees.len())
    }

    /// Normalized mean impurity decrease per feature, in feature order
    pub fn importance(&self) -> Vec<(FeatureName, f64)> {
        self.feature_names
            .iter()
            .copied()
            .zip(self.importance.iter().copied())
            .collect()
    }

    /// Classify the test partition and derive accuracy figures
    pub fn evaluate(&self, test: &SampleSet) -> Result<ValidationReport> {
        self.check_features(test.feature_names())?;
        if test.is_empty() {
            return Err(Error::no_data("validation", "test partition is empty"));
        }
        let matrix =
            ConfusionMatrix::from_pairs(test.iter().map(|s| (s.label, self.predict(&s.features))));
        let report = ValidationReport::from_matrix(matrix);
        info!(
            "Validation on {} samples: accuracy {:.4}, kappa {:.4}",
            test.len(),
            report.accuracy,
            report.kappa
        );
        Ok(report)
    }

    /// Classify every pixel of `stack`
    pub fn classify(&self, stack: &FeatureStack) -> Result<Classification> {
        self.check_features(stack.keys())?;
        let template = stack
            .template()
            .ok_or_else(|| Error::no_data("classification", "feature stack is empty"))?;
        let (rows, cols) = template.shape();
        let n_features = stack.len();

        let pixels: Vec<(u8, f64)> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut buf = vec![0.0; n_features];
                let mut row_data = vec![(CLASS_NODATA, f64::NAN); cols];
                for (col, out) in row_data.iter_mut().enumerate() {
                    if stack.pixel_into(row, col, &mut buf) {
                        *out = (self.predict(&buf), self.probability(&buf));
                    }
                }
                row_data
            })
            .collect();

        let (class_data, prob_data): (Vec<u8>, Vec<f64>) = pixels.into_iter().unzip();
        let classes = template.derive(class_data, Some(CLASS_NODATA))?;
        let probability = template.derive(prob_data, Some(f64::NAN))?;
        Ok(Classification {
            classes,
            probability,
        })
    }
}
