//! Supervised paddy / non-paddy classification
//!
//! - **RandomForest**: seeded bagged CART ensemble, Gini splits
//! - **TrainedModel**: prediction, class probability and feature importance,
//!   bound to the feature order it was trained on
//! - **ValidationReport**: confusion matrix, accuracy, kappa and per-class
//!   producer / consumer accuracy

mod forest;
mod metrics;
mod tree;

pub use forest::{Classification, ForestParams, RandomForest, TrainedModel, CLASS_NODATA};
pub use metrics::{ClassMetrics, ConfusionMatrix, ValidationReport};
pub use tree::{DecisionNode, DecisionTree, TreeParams};
