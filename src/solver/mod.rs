//! Numerical optimizer backends.
//!
//! The fit engine talks to optimizers through two capability traits:
//!
//! - [`ConstrainedMinimizer`]: gradient-based minimization under inequality
//!   constraints `c(x) >= 0`, no variable bounds (the coefficient fit)
//! - [`BoundedMinimizer`]: local minimization inside a box (the robustness search)
//!
//! Backends shipped here:
//!
//! - [`AugmentedLagrangian`] with inner BFGS solves from `wolfe_bfgs`
//! - [`ProjectedLbfgs`] and [`ProjectedGradient`] ([`projected`])

use nalgebra::{DMatrix, DVector};

use crate::domain::{DomainBox, SolverStatus};

pub mod augmented_lagrangian;
pub mod projected;

pub use augmented_lagrangian::AugmentedLagrangian;
pub use projected::{ProjectedGradient, ProjectedLbfgs};

/// Status codes shared by the backends.
pub mod codes {
    pub const SUCCESS: i32 = 0;
    pub const ITERATION_LIMIT: i32 = 1;
    pub const LINE_SEARCH_FAILED: i32 = 2;
    pub const NON_FINITE: i32 = 3;
    pub const INFEASIBLE: i32 = 4;
}

/// A smooth objective with inequality constraints `c_i(x) >= 0`.
pub trait ConstrainedProblem {
    fn dim(&self) -> usize;
    fn objective(&self, x: &DVector<f64>) -> f64;
    fn gradient(&self, x: &DVector<f64>) -> DVector<f64>;
    /// Values of every inequality constraint at `x`.
    fn constraints(&self, x: &DVector<f64>) -> DVector<f64>;
    /// Jacobian of [`ConstrainedProblem::constraints`]; one row per constraint.
    fn constraint_jacobian(&self, x: &DVector<f64>) -> DMatrix<f64>;
}

/// Final iterate of a constrained solve.
#[derive(Debug, Clone)]
pub struct ConstrainedMinimum {
    pub x: DVector<f64>,
    pub value: f64,
    pub status: SolverStatus,
}

pub trait ConstrainedMinimizer: Send + Sync {
    fn minimize(&self, problem: &dyn ConstrainedProblem, x0: DVector<f64>) -> ConstrainedMinimum;
}

/// Objective for bounded searches: returns `(value, gradient)`.
pub type BoundedObjective<'a> = dyn Fn(&[f64]) -> (f64, Vec<f64>) + Sync + 'a;

/// Final iterate of a bounded local search.
#[derive(Debug, Clone)]
pub struct BoundedMinimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub status: SolverStatus,
}

pub trait BoundedMinimizer: Send + Sync {
    fn minimize(&self, objective: &BoundedObjective<'_>, bounds: &DomainBox, x0: Vec<f64>) -> BoundedMinimum;
}

pub(crate) fn status(code: i32, message: &str, iterations: usize, elapsed_secs: f64) -> SolverStatus {
    SolverStatus {
        message: message.to_string(),
        status: code,
        iterations,
        elapsed_secs,
    }
}
