//! Denominator constraints `c_q · b - 1 >= 0`.
//!
//! A [`DenominatorConstraint`] holds one or more denominator basis rows `b`. The
//! first constraint of every fit is built from the whole training set (one row per
//! training point); each failed robustness check appends a single-row constraint
//! from the witness point.

use nalgebra::{DMatrix, DVector};

use crate::math::dot;

use super::training::TrainingSet;

/// Scalar constraint value for one basis row: `qcoeff · basis - 1`.
pub fn robust_sample(qcoeff: &[f64], basis: &[f64]) -> f64 {
    dot(qcoeff, basis) - 1.0
}

#[derive(Debug, Clone)]
pub struct DenominatorConstraint {
    rows: DMatrix<f64>,
}

impl DenominatorConstraint {
    /// Vectorized constraint over every training row.
    pub fn from_training(ts: &TrainingSet) -> Self {
        Self { rows: ts.q.clone() }
    }

    /// Constraint from the denominator basis evaluated at a single point.
    pub fn from_basis(basis: &[f64]) -> Self {
        Self {
            rows: DMatrix::from_row_slice(1, basis.len(), basis),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows.nrows()
    }

    /// [`robust_sample`] of every row.
    pub fn values(&self, qcoeff: &DVector<f64>) -> DVector<f64> {
        let q = qcoeff.as_slice();
        DVector::from_iterator(
            self.rows.nrows(),
            self.rows.row_iter().map(|row| {
                let basis: Vec<f64> = row.iter().copied().collect();
                robust_sample(q, &basis)
            }),
        )
    }
}

/// Append-only, ordered collection of denominator constraints.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    m_terms: usize,
    n_terms: usize,
    constraints: Vec<DenominatorConstraint>,
}

impl ConstraintSet {
    /// Start a set holding only the training-set constraint.
    pub fn from_training(ts: &TrainingSet) -> Self {
        Self {
            m_terms: ts.m_terms(),
            n_terms: ts.n_terms(),
            constraints: vec![DenominatorConstraint::from_training(ts)],
        }
    }

    pub fn push(&mut self, constraint: DenominatorConstraint) {
        debug_assert_eq!(constraint.rows.ncols(), self.n_terms);
        self.constraints.push(constraint);
    }

    /// Number of constraint descriptors (not rows).
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Total number of scalar inequality rows.
    pub fn row_count(&self) -> usize {
        self.constraints.iter().map(|c| c.rows()).sum()
    }

    /// Stacked constraint values for a full coefficient vector (numerator first).
    pub fn values(&self, coeff: &DVector<f64>) -> DVector<f64> {
        let qcoeff = coeff.rows(self.m_terms, self.n_terms).into_owned();
        let mut out = DVector::<f64>::zeros(self.row_count());
        let mut offset = 0;
        for c in &self.constraints {
            let v = c.values(&qcoeff);
            out.rows_mut(offset, v.len()).copy_from(&v);
            offset += v.len();
        }
        out
    }

    /// Constant Jacobian with respect to the full coefficient vector.
    ///
    /// The numerator block is zero; the denominator block is the stacked rows.
    pub fn jacobian(&self) -> DMatrix<f64> {
        let mut jac = DMatrix::<f64>::zeros(self.row_count(), self.m_terms + self.n_terms);
        let mut offset = 0;
        for c in &self.constraints {
            let k = c.rows();
            jac.view_mut((offset, self.m_terms), (k, self.n_terms)).copy_from(&c.rows);
            offset += k;
        }
        jac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::structure;

    fn training() -> TrainingSet {
        let pts = vec![vec![-1.0], vec![0.0], vec![1.0]];
        TrainingSet::new(pts, &[1.0, 1.0, 1.0], &structure(1, 1), &structure(1, 1))
    }

    #[test]
    fn training_constraint_is_row_wise() {
        let set = ConstraintSet::from_training(&training());
        // p = [0, 0], q = 2 + x
        let c = DVector::from_vec(vec![0.0, 0.0, 2.0, 1.0]);
        let v = set.values(&c);
        assert_eq!(v.as_slice(), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn push_grows_set_and_jacobian() {
        let mut set = ConstraintSet::from_training(&training());
        assert_eq!(set.len(), 1);
        set.push(DenominatorConstraint::from_basis(&[1.0, 0.5]));
        assert_eq!(set.len(), 2);
        assert_eq!(set.row_count(), 4);

        let jac = set.jacobian();
        assert_eq!((jac.nrows(), jac.ncols()), (4, 4));
        assert_eq!(jac[(3, 0)], 0.0);
        assert_eq!(jac[(3, 1)], 0.0);
        assert_eq!(jac[(3, 2)], 1.0);
        assert_eq!(jac[(3, 3)], 0.5);

        let c = DVector::from_vec(vec![9.0, 9.0, 1.0, 2.0]);
        assert!((set.values(&c)[3] - robust_sample(&[1.0, 2.0], &[1.0, 0.5])).abs() < 1e-15);
    }

    #[test]
    fn row_values_match_matrix_form() {
        let ts = training();
        let constraint = DenominatorConstraint::from_training(&ts);
        let q = DVector::from_vec(vec![0.7, -1.3]);
        let expected = (&ts.q * &q).add_scalar(-1.0);
        let got = constraint.values(&q);
        assert_eq!(got.len(), 3);
        for (a, b) in got.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-15);
        }
        // x = -1 gives 0.7 + 1.3 - 1.
        assert!((got[0] - 1.0).abs() < 1e-15);
    }
}
