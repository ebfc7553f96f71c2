//! CART decision tree with Gini impurity
//!
//! Binary labels only (0 background, 1 paddy). Leaves keep their class
//! counts so the forest can report a posterior as well as a vote.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    /// Features tried at each split
    pub variables_per_split: usize,
    /// Minimum samples in each child of a split
    pub min_leaf_population: usize,
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DecisionNode {
    Leaf {
        counts: [usize; 2],
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<DecisionNode>,
        right: Box<DecisionNode>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: DecisionNode,
    /// Impurity decrease per feature, weighted by node size
    importance: Vec<f64>,
}

/// Training matrix: one row per sample
pub(crate) struct TrainingData<'a> {
    pub rows: &'a [&'a [f64]],
    pub labels: &'a [u8],
    pub n_features: usize,
}

impl DecisionTree {
    /// Grow a tree on the samples selected by `indices` (repeats allowed)
    pub(crate) fn fit(
        data: &TrainingData<'_>,
        mut indices: Vec<usize>,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut importance = vec![0.0; data.n_features];
        let root = grow(data, &mut indices, params, rng, 0, &mut importance);
        Self { root, importance }
    }

    /// Class counts of the leaf `features` falls into
    pub fn leaf_counts(&self, features: &[f64]) -> [usize; 2] {
        let mut node = &self.root;
        loop {
            match node {
                DecisionNode::Leaf { counts } => return *counts,
                DecisionNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Fraction of class 1 in the leaf
    pub fn posterior(&self, features: &[f64]) -> f64 {
        let [neg, pos] = self.leaf_counts(features);
        let total = neg + pos;
        if total == 0 {
            return 0.0;
        }
        pos as f64 / total as f64
    }

    /// Majority class of the leaf; ties go to 0
    pub fn predict(&self, features: &[f64]) -> u8 {
        let [neg, pos] = self.leaf_counts(features);
        u8::from(pos > neg)
    }

    pub fn importance(&self) -> &[f64] {
        &self.importance
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &DecisionNode) -> usize {
            match node {
                DecisionNode::Leaf { .. } => 0,
                DecisionNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }
}

fn class_counts(labels: &[u8], indices: &[usize]) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for &i in indices {
        counts[usize::from(labels[i] != 0)] += 1;
    }
    counts
}

fn gini(counts: [usize; 2]) -> f64 {
    let n = (counts[0] + counts[1]) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let p0 = counts[0] as f64 / n;
    let p1 = counts[1] as f64 / n;
    1.0 - p0 * p0 - p1 * p1
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

fn grow(
    data: &TrainingData<'_>,
    indices: &mut [usize],
    params: &TreeParams,
    rng: &mut StdRng,
    depth: usize,
    importance: &mut [f64],
) -> DecisionNode {
    let counts = class_counts(data.labels, indices);
    let n = indices.len();
    let parent_gini = gini(counts);

    let depth_reached = params.max_depth.is_some_and(|d| depth >= d);
    if parent_gini == 0.0 || depth_reached || n < 2 * params.min_leaf_population.max(1) {
        return DecisionNode::Leaf { counts };
    }

    let Some(best) = best_split(data, indices, params, rng, counts) else {
        return DecisionNode::Leaf { counts };
    };
    let gain = parent_gini - best.impurity;
    if gain <= 0.0 {
        return DecisionNode::Leaf { counts };
    }
    importance[best.feature] += gain * n as f64;

    // Stable partition: left block first
    let mut left: Vec<usize> = Vec::with_capacity(n);
    let mut right: Vec<usize> = Vec::with_capacity(n);
    for &i in indices.iter() {
        if data.rows[i][best.feature] <= best.threshold {
            left.push(i);
        } else {
            right.push(i);
        }
    }

    DecisionNode::Split {
        feature: best.feature,
        threshold: best.threshold,
        left: Box::new(grow(data, &mut left, params, rng, depth + 1, importance)),
        right: Box::new(grow(data, &mut right, params, rng, depth + 1, importance)),
    }
}

fn best_split(
    data: &TrainingData<'_>,
    indices: &mut [usize],
    params: &TreeParams,
    rng: &mut StdRng,
    total: [usize; 2],
) -> Option<BestSplit> {
    let n = indices.len();
    let min_leaf = params.min_leaf_population.max(1);
    let m = params.variables_per_split.clamp(1, data.n_features);
    let candidates = rand::seq::index::sample(rng, data.n_features, m);

    let mut best: Option<BestSplit> = None;
    for feature in candidates.iter() {
        indices.sort_by(|&a, &b| data.rows[a][feature].total_cmp(&data.rows[b][feature]));

        let mut left = [0usize; 2];
        for pos in 0..n - 1 {
            left[usize::from(data.labels[indices[pos]] != 0)] += 1;
            let left_n = pos + 1;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }
            let here = data.rows[indices[pos]][feature];
            let next = data.rows[indices[pos + 1]][feature];
            if here >= next {
                continue;
            }
            let right = [total[0] - left[0], total[1] - left[1]];
            let impurity =
                (left_n as f64 * gini(left) + right_n as f64 * gini(right)) / n as f64;
            if best.as_ref().is_none_or(|b| impurity < b.impurity) {
                best = Some(BestSplit {
                    feature,
                    threshold: here + (next - here) / 2.0,
                    impurity,
                });
            }
        }
    }
    best
}
