//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON as a diagnostic log
//! - reloaded later for evaluation

use clap::ValueEnum;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::math::{Exponents, Scaler};

/// Bounded local-search method used by the robustness checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LocalSearchMethod {
    /// Projected limited-memory BFGS (quasi-Newton with box constraints).
    ProjectedLbfgs,
    /// Projected steepest descent with Armijo backtracking.
    ProjectedGradient,
}

impl LocalSearchMethod {
    pub fn display_name(self) -> &'static str {
        match self {
            LocalSearchMethod::ProjectedLbfgs => "projected L-BFGS",
            LocalSearchMethod::ProjectedGradient => "projected gradient",
        }
    }
}

/// Hyper-rectangle `[lower_i, upper_i]` bounding valid (scaled) inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainBox {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl DomainBox {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        debug_assert_eq!(lower.len(), upper.len());
        Self { lower, upper }
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn midpoint(&self) -> Vec<f64> {
        self.lower
            .iter()
            .zip(self.upper.iter())
            .map(|(&lo, &hi)| (lo + hi) / 2.0)
            .collect()
    }

    /// Uniform random point inside the box.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        self.lower
            .iter()
            .zip(self.upper.iter())
            .map(|(&lo, &hi)| lo + rng.r#gen::<f64>() * (hi - lo))
            .collect()
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == self.dim()
            && x
                .iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(&v, (&lo, &hi))| v >= lo && v <= hi)
    }

    /// Clamp `x` into the box in place.
    pub fn project(&self, x: &mut [f64]) {
        for (xi, (&lo, &hi)) in x.iter_mut().zip(self.lower.iter().zip(self.upper.iter())) {
            *xi = xi.clamp(lo, hi);
        }
    }
}

/// Outcome bookkeeping for a single solver call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverStatus {
    pub message: String,
    /// `0` means success; any other value is a backend-specific failure code.
    pub status: i32,
    pub iterations: usize,
    pub elapsed_secs: f64,
}

impl SolverStatus {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// One local-search attempt of the robustness checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestartRecord {
    pub start: Vec<f64>,
    pub point: Vec<f64>,
    pub objective: f64,
    pub status: SolverStatus,
}

/// Aggregate timing of a robustness check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestartSummary {
    pub elapsed_secs: f64,
    pub restarts: usize,
}

/// Result of a robustness check: the weakest denominator value found and where.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessReport {
    pub point: Vec<f64>,
    pub objective: f64,
    pub restarts: Vec<RestartRecord>,
    pub summary: RestartSummary,
}

/// Snapshot of one outer-loop pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub pcoeff: Vec<f64>,
    pub qcoeff: Vec<f64>,
    /// Number of constraints the fit step of this pass was solved under.
    pub constraints: usize,
    pub least_squares: f64,
    pub fit_status: SolverStatus,
    pub robust: RobustnessReport,
}

/// Configuration of a fit run.
///
/// Derived from CLI flags or built directly by library callers.
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// Numerator total degree `m`.
    pub m: usize,
    /// Denominator total degree `n`.
    pub n: usize,
    /// Outer-loop iteration cap.
    pub max_iterations: usize,
    /// Restart budget of each robustness check.
    pub max_restarts: usize,
    /// Minimum acceptable denominator value over the domain box.
    pub threshold: f64,
    pub method: LocalSearchMethod,
    /// Emit per-solver-iteration trace events.
    pub debug: bool,
    pub seed: u64,
    pub scale_min: f64,
    pub scale_max: f64,
    /// Randomized re-runs allowed when the constrained fit does not converge.
    pub max_fit_retries: usize,
    pub fit_max_iter: usize,
    pub fit_ftol: f64,
    pub search_max_iter: usize,
    pub search_ftol: f64,
    /// Run the restarts of a robustness check on the rayon pool.
    pub parallel_restarts: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            m: 1,
            n: 1,
            max_iterations: 1000,
            max_restarts: 100,
            threshold: 0.02,
            method: LocalSearchMethod::ProjectedLbfgs,
            debug: false,
            seed: 42,
            scale_min: -1.0,
            scale_max: 1.0,
            max_fit_retries: 100,
            fit_max_iter: 1001,
            fit_ftol: 1e-9,
            search_max_iter: 1000,
            search_ftol: 1e-4,
            parallel_restarts: false,
        }
    }
}

/// Accepted output of a fit run. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    pub m: usize,
    pub n: usize,
    pub pcoeff: Vec<f64>,
    pub qcoeff: Vec<f64>,
    pub domain: DomainBox,
    pub scaler: Scaler,
    pub struct_p: Vec<Exponents>,
    pub struct_q: Vec<Exponents>,
    pub history: Vec<IterationRecord>,
}

impl FitResult {
    pub fn iterations(&self) -> usize {
        self.history.len()
    }

    /// Robust objective of the accepted pass.
    pub fn robust_objective(&self) -> f64 {
        self.history.last().map(|r| r.robust.objective).unwrap_or(f64::NAN)
    }
}

/// A saved model file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub tool: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub m: usize,
    pub n: usize,
    pub dim: usize,
    /// CSV header names of the input coordinates; empty when unknown.
    #[serde(default)]
    pub coord_names: Vec<String>,
    pub scaler: Scaler,
    pub struct_p: Vec<Exponents>,
    pub struct_q: Vec<Exponents>,
    pub pcoeff: Vec<f64>,
    pub qcoeff: Vec<f64>,
    pub iterations: usize,
    pub robust_objective: f64,
}
