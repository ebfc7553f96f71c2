//! Focal kernel shapes
//!
//! Radii are real-valued pixel distances, so a circle of radius 1.5 covers
//! the 3x3 block (corners at sqrt(2) ≈ 1.41) but none of the 5x5 ring.

use paddyscan_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Shape of a focal window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelShape {
    /// Offsets with `dr² + dc² <= r²`
    #[default]
    Circle,
    /// Offsets with `max(|dr|, |dc|) <= r`
    Square,
}

/// A focal window of given shape and radius in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kernel {
    pub shape: KernelShape,
    pub radius: f64,
}

impl Kernel {
    pub fn new(shape: KernelShape, radius: f64) -> Result<Self> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(Error::config("mode_radius", format!("{radius} must be a non-negative number")));
        }
        Ok(Self { shape, radius })
    }

    pub fn circle(radius: f64) -> Result<Self> {
        Self::new(KernelShape::Circle, radius)
    }

    /// (dr, dc) offsets of every cell in the window, center included
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let r = self.radius.floor() as isize;
        let r2 = self.radius * self.radius;
        let mut offsets = Vec::new();
        for dr in -r..=r {
            for dc in -r..=r {
                let inside = match self.shape {
                    KernelShape::Circle => ((dr * dr + dc * dc) as f64) <= r2,
                    KernelShape::Square => true,
                };
                if inside {
                    offsets.push((dr, dc));
                }
            }
        }
        offsets
    }
}
