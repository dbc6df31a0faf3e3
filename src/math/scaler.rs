//! Affine scaling of raw coordinates into a canonical box.
//!
//! Each dimension `i` is mapped independently:
//!
//! ```text
//! s_i = a + (x_i - min_i) * (b - a) / (max_i - min_i)
//! ```
//!
//! where `min_i`/`max_i` are the observed extremes of the anchor points. The scaled
//! box is therefore `[a, b]^d`, and it is the box every downstream component uses.

use serde::{Deserialize, Serialize};

use crate::domain::DomainBox;
use crate::error::FitError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub a: f64,
    pub b: f64,
    pub raw_min: Vec<f64>,
    pub raw_max: Vec<f64>,
}

impl Scaler {
    /// Build a scaler from anchor points.
    ///
    /// Fails if the points are empty, ragged, non-finite, if any dimension has zero
    /// range, or if `[a, b]` is not a proper interval.
    pub fn new(points: &[Vec<f64>], a: f64, b: f64) -> Result<Self, FitError> {
        if !(a.is_finite() && b.is_finite() && b > a) {
            return Err(FitError::InvalidConfiguration(format!(
                "Invalid scale range [{a}, {b}] (must be finite with max > min)."
            )));
        }
        let Some(first) = points.first() else {
            return Err(FitError::InvalidConfiguration("No anchor points supplied.".into()));
        };
        let dim = first.len();
        if dim == 0 {
            return Err(FitError::InvalidConfiguration(
                "Anchor points must have at least one coordinate.".into(),
            ));
        }

        let mut raw_min = vec![f64::INFINITY; dim];
        let mut raw_max = vec![f64::NEG_INFINITY; dim];
        for (row, p) in points.iter().enumerate() {
            if p.len() != dim {
                return Err(FitError::InvalidConfiguration(format!(
                    "Anchor point {row} has {} coordinates, expected {dim}.",
                    p.len()
                )));
            }
            for (i, &v) in p.iter().enumerate() {
                if !v.is_finite() {
                    return Err(FitError::InvalidConfiguration(format!(
                        "Anchor point {row} has a non-finite coordinate in dimension {i}."
                    )));
                }
                raw_min[i] = raw_min[i].min(v);
                raw_max[i] = raw_max[i].max(v);
            }
        }

        if let Some(i) = (0..dim).find(|&i| raw_max[i] <= raw_min[i]) {
            return Err(FitError::InvalidConfiguration(format!(
                "Coordinate {i} is constant across all anchor points; cannot scale it."
            )));
        }

        Ok(Self { a, b, raw_min, raw_max })
    }

    pub fn dim(&self) -> usize {
        self.raw_min.len()
    }

    /// The canonical box `[a, b]^d` the scaled points live in.
    pub fn box_scaled(&self) -> DomainBox {
        DomainBox::new(vec![self.a; self.dim()], vec![self.b; self.dim()])
    }

    /// The raw-coordinate box spanned by the anchor points.
    pub fn box_raw(&self) -> DomainBox {
        DomainBox::new(self.raw_min.clone(), self.raw_max.clone())
    }

    pub fn scale(&self, x: &[f64]) -> Vec<f64> {
        let span = self.b - self.a;
        x.iter()
            .zip(self.raw_min.iter().zip(self.raw_max.iter()))
            .map(|(&xi, (&lo, &hi))| self.a + (xi - lo) * span / (hi - lo))
            .collect()
    }

    pub fn unscale(&self, s: &[f64]) -> Vec<f64> {
        let span = self.b - self.a;
        s.iter()
            .zip(self.raw_min.iter().zip(self.raw_max.iter()))
            .map(|(&si, (&lo, &hi))| lo + (si - self.a) * (hi - lo) / span)
            .collect()
    }

    pub fn scale_all(&self, points: &[Vec<f64>]) -> Vec<Vec<f64>> {
        points.iter().map(|p| self.scale(p)).collect()
    }
}
