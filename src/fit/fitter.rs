//! Constrained coefficient fit.
//!
//! Given a starting guess and the current constraint set, we minimize the
//! linearized least-squares objective with a [`ConstrainedMinimizer`]. A solve that
//! does not converge is re-run from a uniformly random guess in `[0, 1)^(M+N)`; at
//! most `max_retries` such re-runs happen before the fit step gives up.

use nalgebra::{DMatrix, DVector};
use rand::Rng;

use crate::domain::SolverStatus;
use crate::error::FitError;
use crate::solver::{ConstrainedMinimizer, ConstrainedProblem};

use super::constraints::ConstraintSet;
use super::objective::{least_squares, least_squares_gradient};
use super::training::TrainingSet;

/// Least-squares problem under the current denominator constraints.
pub struct FitProblem<'a> {
    pub training: &'a TrainingSet,
    pub constraints: &'a ConstraintSet,
}

impl ConstrainedProblem for FitProblem<'_> {
    fn dim(&self) -> usize {
        self.training.m_terms() + self.training.n_terms()
    }

    fn objective(&self, x: &DVector<f64>) -> f64 {
        least_squares(x, self.training)
    }

    fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        least_squares_gradient(x, self.training)
    }

    fn constraints(&self, x: &DVector<f64>) -> DVector<f64> {
        self.constraints.values(x)
    }

    fn constraint_jacobian(&self, _x: &DVector<f64>) -> DMatrix<f64> {
        self.constraints.jacobian()
    }
}

/// Accepted output of a fit step.
#[derive(Debug, Clone)]
pub struct FitStep {
    pub coeffs: DVector<f64>,
    pub value: f64,
    pub status: SolverStatus,
    /// Randomized re-runs needed before convergence.
    pub retries: usize,
}

pub fn constrained_fit<R: Rng + ?Sized>(
    solver: &dyn ConstrainedMinimizer,
    training: &TrainingSet,
    constraints: &ConstraintSet,
    x0: DVector<f64>,
    max_retries: usize,
    rng: &mut R,
) -> Result<FitStep, FitError> {
    let problem = FitProblem { training, constraints };
    let dim = problem.dim();
    debug_assert_eq!(x0.len(), dim);

    let mut guess = x0;
    let mut retries = 0usize;
    loop {
        let out = solver.minimize(&problem, guess);
        if out.status.success() {
            return Ok(FitStep {
                coeffs: out.x,
                value: out.value,
                status: out.status,
                retries,
            });
        }

        if retries >= max_retries {
            return Err(FitError::SolverNonConvergence {
                retries,
                status: out.status,
                history: Vec::new(),
            });
        }
        retries += 1;
        tracing::debug!(
            retries,
            status = out.status.status,
            message = %out.status.message,
            "constrained fit did not converge; restarting from a random guess"
        );
        guess = DVector::from_fn(dim, |_, _| rng.r#gen::<f64>());
    }
}
