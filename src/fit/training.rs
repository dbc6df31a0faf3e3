//! Training data in fixed-width basis form.

use nalgebra::{DMatrix, DVector};

use crate::math::{recurrence, Exponents};

/// Scaled anchor points with their numerator/denominator basis matrices.
///
/// Row `t` of `p` (`T × M`) and `q` (`T × N`) holds the basis vector of point `t`.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub points: Vec<Vec<f64>>,
    pub y: DVector<f64>,
    pub p: DMatrix<f64>,
    pub q: DMatrix<f64>,
}

impl TrainingSet {
    pub fn new(points: Vec<Vec<f64>>, values: &[f64], struct_p: &[Exponents], struct_q: &[Exponents]) -> Self {
        let t = points.len();
        let mut p = DMatrix::<f64>::zeros(t, struct_p.len());
        let mut q = DMatrix::<f64>::zeros(t, struct_q.len());
        for (i, x) in points.iter().enumerate() {
            for (j, v) in recurrence(x, struct_p).into_iter().enumerate() {
                p[(i, j)] = v;
            }
            for (j, v) in recurrence(x, struct_q).into_iter().enumerate() {
                q[(i, j)] = v;
            }
        }
        Self {
            points,
            y: DVector::from_row_slice(values),
            p,
            q,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Numerator term count `M`.
    pub fn m_terms(&self) -> usize {
        self.p.ncols()
    }

    /// Denominator term count `N`.
    pub fn n_terms(&self) -> usize {
        self.q.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::structure;

    #[test]
    fn basis_matrices_have_expected_shape() {
        let pts = vec![vec![0.5, -0.5], vec![1.0, 0.0], vec![0.0, 1.0]];
        let ts = TrainingSet::new(pts, &[1.0, 2.0, 3.0], &structure(2, 2), &structure(2, 1));
        assert_eq!(ts.len(), 3);
        assert_eq!((ts.p.nrows(), ts.p.ncols()), (3, 6));
        assert_eq!((ts.q.nrows(), ts.q.ncols()), (3, 3));
        // Row 0 of q is [1, x, y].
        assert_eq!(ts.q[(0, 1)], 0.5);
        assert_eq!(ts.q[(0, 2)], -0.5);
        // xy term of p at point 0.
        assert_eq!(ts.p[(0, 4)], -0.25);
    }
}
