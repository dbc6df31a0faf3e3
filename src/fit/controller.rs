//! Outer fit loop.
//!
//! ```text
//! Fitting ──> RobustnessCheck ──┬──> Converged
//!    ^                          │
//!    └──── AddConstraint <──────┘        (cap reached: Failed)
//! ```
//!
//! Each pass solves the constrained least-squares problem, then searches the domain
//! box for the weakest denominator value. A pass whose weakest value stays at or
//! above the threshold is accepted; otherwise the witness point becomes a new
//! constraint and the next pass starts from the last candidate.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{FitConfig, FitResult, IterationRecord, LocalSearchMethod};
use crate::error::FitError;
use crate::math::{recurrence, structure, Scaler};
use crate::solver::{AugmentedLagrangian, BoundedMinimizer, ConstrainedMinimizer, ProjectedGradient, ProjectedLbfgs};

use super::constraints::{ConstraintSet, DenominatorConstraint};
use super::fitter::constrained_fit;
use super::robustness::RobustnessChecker;
use super::training::TrainingSet;

/// Solver backends used by a fit run.
pub struct Solvers {
    pub constrained: Box<dyn ConstrainedMinimizer>,
    pub bounded: Box<dyn BoundedMinimizer>,
}

impl Solvers {
    pub fn from_config(config: &FitConfig) -> Self {
        let constrained = AugmentedLagrangian::new(config.fit_max_iter, config.fit_ftol).verbose(config.debug);
        let bounded: Box<dyn BoundedMinimizer> = match config.method {
            LocalSearchMethod::ProjectedLbfgs => {
                Box::new(ProjectedLbfgs::new(config.search_max_iter, config.search_ftol))
            }
            LocalSearchMethod::ProjectedGradient => {
                Box::new(ProjectedGradient::new(config.search_max_iter, config.search_ftol))
            }
        };
        Self {
            constrained: Box::new(constrained),
            bounded,
        }
    }
}

/// Fit a robust rational approximation with the default backends.
///
/// Randomness comes from `StdRng::seed_from_u64(config.seed)`, so equal inputs give
/// bit-identical results.
pub fn fit(points: &[Vec<f64>], values: &[f64], config: &FitConfig) -> Result<FitResult, FitError> {
    let solvers = Solvers::from_config(config);
    let mut rng = StdRng::seed_from_u64(config.seed);
    fit_with(points, values, config, &solvers, &mut rng)
}

/// Fit with caller-supplied backends and generator.
pub fn fit_with<R: Rng + ?Sized>(
    points: &[Vec<f64>],
    values: &[f64],
    config: &FitConfig,
    solvers: &Solvers,
    rng: &mut R,
) -> Result<FitResult, FitError> {
    validate(points, values, config)?;

    let scaler = Scaler::new(points, config.scale_min, config.scale_max)?;
    let dim = scaler.dim();
    let domain = scaler.box_scaled();
    let struct_p = structure(dim, config.m);
    let struct_q = structure(dim, config.n);
    let (m_terms, n_terms) = (struct_p.len(), struct_q.len());

    let training = TrainingSet::new(scaler.scale_all(points), values, &struct_p, &struct_q);
    let mut constraints = ConstraintSet::from_training(&training);

    tracing::info!(
        dim,
        m = config.m,
        n = config.n,
        m_terms,
        n_terms,
        points = training.len(),
        threshold = config.threshold,
        method = config.method.display_name(),
        "starting robust rational fit"
    );

    let checker = RobustnessChecker {
        minimizer: solvers.bounded.as_ref(),
        struct_q: &struct_q,
        domain: &domain,
        max_restarts: config.max_restarts,
        threshold: config.threshold,
        parallel: config.parallel_restarts,
    };

    let mut guess = DVector::<f64>::from_element(m_terms + n_terms, 1.0);
    guess[m_terms] = 2.0;
    let mut history: Vec<IterationRecord> = Vec::new();

    for pass in 0..config.max_iterations {
        tracing::debug!(pass, constraints = constraints.len(), "fitting");
        let step = match constrained_fit(
            solvers.constrained.as_ref(),
            &training,
            &constraints,
            guess,
            config.max_fit_retries,
            &mut *rng,
        ) {
            Ok(step) => step,
            Err(FitError::SolverNonConvergence { retries, status, .. }) => {
                tracing::info!(
                    iterations = history.len(),
                    retries,
                    status = status.status,
                    "constrained fit gave up"
                );
                return Err(FitError::SolverNonConvergence {
                    retries,
                    status,
                    history,
                });
            }
            Err(err) => return Err(err),
        };

        let pcoeff: Vec<f64> = step.coeffs.rows(0, m_terms).iter().copied().collect();
        let qcoeff: Vec<f64> = step.coeffs.rows(m_terms, n_terms).iter().copied().collect();

        tracing::debug!(pass, least_squares = step.value, retries = step.retries, "robustness check");
        let robust = checker.check(&qcoeff, &mut *rng);
        let weakest = robust.objective;
        let witness = robust.point.clone();

        history.push(IterationRecord {
            pcoeff: pcoeff.clone(),
            qcoeff: qcoeff.clone(),
            constraints: constraints.len(),
            least_squares: step.value,
            fit_status: step.status,
            robust,
        });

        if weakest >= config.threshold {
            tracing::info!(
                iterations = history.len(),
                robust_objective = weakest,
                constraints = constraints.len(),
                "converged"
            );
            return Ok(FitResult {
                m: config.m,
                n: config.n,
                pcoeff,
                qcoeff,
                domain,
                scaler,
                struct_p,
                struct_q,
                history,
            });
        }

        tracing::debug!(pass, robust_objective = weakest, point = ?witness, "adding constraint");
        constraints.push(DenominatorConstraint::from_basis(&recurrence(&witness, &struct_q)));
        guess = step.coeffs;
    }

    tracing::info!(
        iterations = history.len(),
        threshold = config.threshold,
        "robustness not achieved within the iteration cap"
    );
    Err(FitError::RobustnessNotAchieved {
        threshold: config.threshold,
        history,
    })
}

fn validate(points: &[Vec<f64>], values: &[f64], config: &FitConfig) -> Result<(), FitError> {
    let invalid = |msg: String| Err(FitError::InvalidConfiguration(msg));

    if points.is_empty() {
        return invalid("Training set is empty.".into());
    }
    if points.len() != values.len() {
        return invalid(format!(
            "Got {} points but {} values.",
            points.len(),
            values.len()
        ));
    }
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return invalid(format!("Value {i} is not finite."));
    }
    if config.m == 0 || config.n == 0 {
        return invalid(format!("Degrees must be at least 1 (got m={}, n={}).", config.m, config.n));
    }
    if !config.threshold.is_finite() {
        return invalid("Threshold must be finite.".into());
    }
    if config.max_iterations == 0 {
        return invalid("max_iterations must be at least 1.".into());
    }
    if config.max_restarts == 0 {
        return invalid("max_restarts must be at least 1.".into());
    }
    if config.fit_max_iter == 0 || config.search_max_iter == 0 {
        return invalid("Solver iteration budgets must be at least 1.".into());
    }
    if !(config.fit_ftol > 0.0) || !(config.search_ftol > 0.0) {
        return invalid("Solver tolerances must be positive.".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SolverStatus;
    use crate::error::AppError;
    use crate::fit::robustness::denominator_at;
    use crate::math::dot;
    use crate::solver::{ConstrainedMinimum, ConstrainedProblem};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Converges on the first solve, then never again.
    struct FirstPassOnly {
        calls: AtomicUsize,
    }

    impl ConstrainedMinimizer for FirstPassOnly {
        fn minimize(&self, problem: &dyn ConstrainedProblem, x0: DVector<f64>) -> ConstrainedMinimum {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return AugmentedLagrangian::default().minimize(problem, x0);
            }
            ConstrainedMinimum {
                value: problem.objective(&x0),
                x: x0,
                status: SolverStatus {
                    message: "forced failure".into(),
                    status: 9,
                    iterations: 0,
                    elapsed_secs: 0.0,
                },
            }
        }
    }

    fn line_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let pts: Vec<Vec<f64>> = (0..20).map(|i| vec![2.0 * i as f64 / 19.0]).collect();
        let ys = pts.iter().map(|x| 1.0 / (1.0 + x[0])).collect();
        (pts, ys)
    }

    /// Near-singular target sampled away from its pole.
    fn spike_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut pts = Vec::new();
        for i in 0..10 {
            let x = 0.5 + 0.5 * i as f64 / 9.0;
            pts.push(vec![x]);
            pts.push(vec![-x]);
        }
        let ys = pts.iter().map(|x| 1.0 / (x[0] * x[0] + 0.001)).collect();
        (pts, ys)
    }

    fn config(m: usize, n: usize, threshold: f64) -> FitConfig {
        FitConfig {
            m,
            n,
            threshold,
            max_restarts: 10,
            ..FitConfig::default()
        }
    }

    fn ratio(result: &FitResult, raw: &[f64]) -> f64 {
        let s = result.scaler.scale(raw);
        dot(&result.pcoeff, &recurrence(&s, &result.struct_p)) / dot(&result.qcoeff, &recurrence(&s, &result.struct_q))
    }

    #[test]
    fn one_dimensional_target_converges_on_first_pass() {
        let (pts, ys) = line_data();
        let result = fit(&pts, &ys, &config(1, 1, 0.1)).unwrap();
        assert_eq!(result.iterations(), 1);
        assert_eq!(result.pcoeff.len(), 2);
        assert_eq!(result.qcoeff.len(), 2);
        assert!(result.robust_objective() >= 0.1);
        for (x, y) in pts.iter().zip(ys.iter()) {
            assert!((ratio(&result, x) - y).abs() < 1e-3, "x={x:?}");
        }
    }

    #[test]
    fn two_dimensional_shapes_follow_degrees() {
        let mut pts = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                pts.push(vec![i as f64 / 5.0, j as f64 / 5.0]);
            }
        }
        let ys: Vec<f64> = pts.iter().map(|p| (1.0 + p[0] * p[1]) / (3.0 + p[0] + p[1])).collect();
        let result = fit(&pts, &ys, &config(2, 1, 0.1)).unwrap();
        assert_eq!(result.pcoeff.len(), 6);
        assert_eq!(result.qcoeff.len(), 3);
        assert_eq!(result.domain.dim(), 2);
        assert_eq!(result.struct_p.len(), 6);
        for (x, y) in pts.iter().zip(ys.iter()) {
            assert!((ratio(&result, x) - y).abs() < 1e-3);
        }

        // Denominator stays above the threshold over the whole box.
        let mut rng = StdRng::seed_from_u64(1234);
        for _ in 0..1000 {
            let x = result.domain.sample(&mut rng);
            assert!(denominator_at(&result.qcoeff, &x, &result.struct_q) >= 0.1 - 1e-9);
        }
    }

    #[test]
    fn weak_denominator_adds_constraints() {
        let (pts, ys) = spike_data();
        let cfg = FitConfig {
            max_iterations: 10,
            ..config(1, 2, 0.1)
        };
        let history = match fit(&pts, &ys, &cfg) {
            Ok(result) => result.history,
            Err(FitError::RobustnessNotAchieved { history, .. }) => history,
            Err(other) => panic!("unexpected error: {other}"),
        };
        assert!(history.len() >= 2);
        assert!(history[0].robust.objective < 0.1);
        for pair in history.windows(2) {
            assert!(pair[1].constraints > pair[0].constraints);
        }
        assert_eq!(history[0].constraints, 1);
    }

    #[test]
    fn unreachable_threshold_exhausts_iterations() {
        let (pts, ys) = line_data();
        let cfg = FitConfig {
            max_iterations: 3,
            max_restarts: 3,
            ..config(1, 1, 1e6)
        };
        match fit(&pts, &ys, &cfg) {
            Err(FitError::RobustnessNotAchieved { threshold, history }) => {
                assert_eq!(threshold, 1e6);
                assert_eq!(history.len(), 3);
                assert_eq!(
                    history.iter().map(|r| r.constraints).collect::<Vec<_>>(),
                    vec![1, 2, 3]
                );
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn identical_seeds_reproduce_results() {
        let (pts, ys) = spike_data();
        let cfg = FitConfig {
            max_iterations: 4,
            ..config(1, 2, 0.1)
        };
        let a = fit(&pts, &ys, &cfg);
        let b = fit(&pts, &ys, &cfg);
        let (ha, hb) = match (a, b) {
            (Ok(a), Ok(b)) => (a.history, b.history),
            (Err(FitError::RobustnessNotAchieved { history: a, .. }), Err(FitError::RobustnessNotAchieved { history: b, .. })) => (a, b),
            (a, b) => panic!("outcomes differ: {a:?} vs {b:?}"),
        };
        assert_eq!(ha.len(), hb.len());
        for (ra, rb) in ha.iter().zip(hb.iter()) {
            assert_eq!(ra.pcoeff, rb.pcoeff);
            assert_eq!(ra.qcoeff, rb.qcoeff);
            assert_eq!(ra.robust.point, rb.robust.point);
        }
    }

    #[test]
    fn parallel_restarts_match_sequential() {
        let (pts, ys) = spike_data();
        let seq_cfg = FitConfig {
            max_iterations: 4,
            ..config(1, 2, 0.1)
        };
        let par_cfg = FitConfig {
            parallel_restarts: true,
            ..seq_cfg.clone()
        };
        let history = |r: Result<FitResult, FitError>| match r {
            Ok(res) => res.history,
            Err(FitError::RobustnessNotAchieved { history, .. }) => history,
            Err(other) => panic!("unexpected error: {other}"),
        };
        let hs = history(fit(&pts, &ys, &seq_cfg));
        let hp = history(fit(&pts, &ys, &par_cfg));
        assert_eq!(hs.len(), hp.len());
        for (a, b) in hs.iter().zip(hp.iter()) {
            assert_eq!(a.qcoeff, b.qcoeff);
            assert_eq!(a.robust.point, b.robust.point);
            assert_eq!(a.robust.summary.restarts, b.robust.summary.restarts);
        }
    }

    #[test]
    fn invalid_inputs_are_rejected_before_solving() {
        let (pts, ys) = line_data();
        let cases: Vec<(Vec<Vec<f64>>, Vec<f64>, FitConfig)> = vec![
            (vec![], vec![], config(1, 1, 0.1)),
            (pts.clone(), ys[..5].to_vec(), config(1, 1, 0.1)),
            (pts.clone(), ys.clone(), config(0, 1, 0.1)),
            (pts.clone(), ys.clone(), config(1, 1, f64::NAN)),
            (
                pts.clone(),
                ys.clone(),
                FitConfig {
                    max_restarts: 0,
                    ..config(1, 1, 0.1)
                },
            ),
            (vec![vec![1.0]; 4], vec![1.0; 4], config(1, 1, 0.1)),
        ];
        for (p, y, cfg) in cases {
            assert!(matches!(fit(&p, &y, &cfg), Err(FitError::InvalidConfiguration(_))));
        }
    }

    #[test]
    fn fit_step_failure_keeps_completed_passes() {
        let (pts, ys) = line_data();
        let cfg = FitConfig {
            max_iterations: 5,
            max_restarts: 3,
            max_fit_retries: 2,
            ..config(1, 1, 1e6)
        };
        let solvers = Solvers {
            constrained: Box::new(FirstPassOnly {
                calls: AtomicUsize::new(0),
            }),
            bounded: Box::new(ProjectedLbfgs::new(cfg.search_max_iter, cfg.search_ftol)),
        };
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let err = fit_with(&pts, &ys, &cfg, &solvers, &mut rng).unwrap_err();
        match &err {
            FitError::SolverNonConvergence { retries, status, history } => {
                assert_eq!(*retries, 2);
                assert_eq!(status.status, 9);
                assert_eq!(history.len(), 1);
                assert_eq!(history[0].constraints, 1);
                assert!(history[0].robust.objective < 1e6);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(err.history().map(|h| h.len()), Some(1));
        assert!(err.history_json().is_some());
        assert_eq!(AppError::from(err).exit_code(), 3);
    }
}
