//! Accuracy assessment for binary classification

use serde::Serialize;

/// Confusion matrix over classes 0 and 1; rows are actual, columns
/// predicted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u8, u8)>) -> Self {
        let mut matrix = Self::default();
        for (actual, predicted) in pairs {
            matrix.add(actual, predicted);
        }
        matrix
    }

    pub fn add(&mut self, actual: u8, predicted: u8) {
        self.counts[usize::from(actual != 0)][usize::from(predicted != 0)] += 1;
    }

    pub fn get(&self, actual: u8, predicted: u8) -> usize {
        self.counts[usize::from(actual != 0)][usize::from(predicted != 0)]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    fn row_total(&self, class: usize) -> usize {
        self.counts[class].iter().sum()
    }

    fn col_total(&self, class: usize) -> usize {
        self.counts[0][class] + self.counts[1][class]
    }

    /// Correct / total; 0 for an empty matrix
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.counts[0][0] + self.counts[1][1]) as f64 / total as f64
    }

    /// Cohen's kappa.
    ///
    /// When chance agreement is already 1 (a single class in both actual and
    /// predicted) kappa is 1 for perfect agreement, else 0.
    pub fn kappa(&self) -> f64 {
        let total = self.total() as f64;
        if total == 0.0 {
            return 0.0;
        }
        let observed = self.accuracy();
        let expected: f64 = (0..2)
            .map(|k| self.row_total(k) as f64 * self.col_total(k) as f64)
            .sum::<f64>()
            / (total * total);
        if (1.0 - expected).abs() < f64::EPSILON {
            return if observed >= 1.0 { 1.0 } else { 0.0 };
        }
        (observed - expected) / (1.0 - expected)
    }

    /// Producer's accuracy (recall) of `class`
    pub fn producers_accuracy(&self, class: u8) -> f64 {
        let k = usize::from(class != 0);
        ratio(self.counts[k][k], self.row_total(k))
    }

    /// Consumer's accuracy (precision) of `class`
    pub fn consumers_accuracy(&self, class: u8) -> f64 {
        let k = usize::from(class != 0);
        ratio(self.counts[k][k], self.col_total(k))
    }

    pub fn f1(&self, class: u8) -> f64 {
        let p = self.consumers_accuracy(class);
        let r = self.producers_accuracy(class);
        if p + r == 0.0 {
            return 0.0;
        }
        2.0 * p * r / (p + r)
    }

    /// Rows of the matrix, actual class 0 first
    pub fn rows(&self) -> [[usize; 2]; 2] {
        self.counts
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Per-class accuracy figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub class: u8,
    /// Test samples of this class
    pub support: usize,
    pub producers_accuracy: f64,
    pub consumers_accuracy: f64,
    pub f1: f64,
}

/// Accuracy of a trained model on the test partition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub confusion_matrix: ConfusionMatrix,
    pub accuracy: f64,
    pub kappa: f64,
    pub classes: Vec<ClassMetrics>,
}

impl ValidationReport {
    pub fn from_matrix(matrix: ConfusionMatrix) -> Self {
        let classes = [0u8, 1]
            .into_iter()
            .map(|class| ClassMetrics {
                class,
                support: matrix.row_total(usize::from(class)),
                producers_accuracy: matrix.producers_accuracy(class),
                consumers_accuracy: matrix.consumers_accuracy(class),
                f1: matrix.f1(class),
            })
            .collect();
        Self {
            accuracy: matrix.accuracy(),
            kappa: matrix.kappa(),
            confusion_matrix: matrix,
            classes,
        }
    }

    pub fn class(&self, class: u8) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.class == class)
    }
}
