//! Seeded train/test partition

use super::SampleSet;
use paddyscan_core::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionParams {
    /// Expected fraction of samples assigned to Train, in (0, 1)
    pub split_ratio: f64,
    pub seed: u64,
}

impl Default for PartitionParams {
    fn default() -> Self {
        Self {
            split_ratio: 0.7,
            seed: 42,
        }
    }
}

impl PartitionParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.split_ratio > 0.0 && self.split_ratio < 1.0) {
            return Err(Error::config(
                "split_ratio",
                format!("{} is outside (0, 1)", self.split_ratio),
            ));
        }
        Ok(())
    }
}

/// Disjoint train and test subsets of one sample set
#[derive(Debug, Clone)]
pub struct Partition {
    pub train: SampleSet,
    pub test: SampleSet,
}

/// Split `samples` into Train and Test.
///
/// Each sample, in order, gets a uniform draw in [0, 1); draws below the
/// split ratio go to Train. The two subsets are disjoint, together cover the
/// input, and are identical across runs with the same seed. An empty subset
/// is an error.
pub fn partition(samples: &SampleSet, params: PartitionParams) -> Result<Partition> {
    params.validate()?;

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut train = SampleSet::new(samples.feature_names().to_vec());
    let mut test = SampleSet::new(samples.feature_names().to_vec());
    for sample in samples.iter() {
        let draw: f64 = rng.gen();
        if draw < params.split_ratio {
            train.push(sample.clone())?;
        } else {
            test.push(sample.clone())?;
        }
    }

    info!(
        "Partition (ratio {}, seed {}): {} train, {} test",
        params.split_ratio,
        params.seed,
        train.len(),
        test.len()
    );
    if train.is_empty() {
        return Err(Error::no_data("train partition", format!("0 of {} samples", samples.len())));
    }
    if test.is_empty() {
        return Err(Error::no_data("test partition", format!("0 of {} samples", samples.len())));
    }
    Ok(Partition { train, test })
}
