//! Global robustness search for the denominator.
//!
//! The denominator `g(x) = c_q · basis(x)` can have several local minima inside the
//! domain box, so one local search cannot certify it. We approximate the global
//! minimum with bounded multi-restart local search:
//!
//! - restart 0 starts at the box midpoint
//! - restarts `1..R` start at uniform random points in the box
//! - the search stops at the first restart whose value drops below the threshold
//!
//! All start points are drawn before any local search runs, so the generator state
//! after a check does not depend on early exit or on parallel execution. In parallel
//! mode every restart runs on the rayon pool and the results are scanned in restart
//! order with the same early-exit rule, so the lowest violating index wins and the
//! report is identical to the sequential one.

use rand::Rng;
use rayon::prelude::*;

use crate::domain::{DomainBox, RestartRecord, RestartSummary, RobustnessReport};
use crate::math::{dot, recurrence, recurrence_gradient, Exponents};
use crate::solver::BoundedMinimizer;

/// Denominator value `qcoeff · basis(x)`.
pub fn denominator_at(qcoeff: &[f64], x: &[f64], struct_q: &[Exponents]) -> f64 {
    dot(qcoeff, &recurrence(x, struct_q))
}

/// Denominator value and its spatial gradient at `x`.
pub fn denominator_with_gradient(qcoeff: &[f64], x: &[f64], struct_q: &[Exponents]) -> (f64, Vec<f64>) {
    let value = denominator_at(qcoeff, x, struct_q);
    let jac = recurrence_gradient(x, struct_q);
    let mut grad = vec![0.0; x.len()];
    for (row, &c) in jac.iter().zip(qcoeff.iter()) {
        for (gj, &dj) in grad.iter_mut().zip(row.iter()) {
            *gj += c * dj;
        }
    }
    (value, grad)
}

pub struct RobustnessChecker<'a> {
    pub minimizer: &'a dyn BoundedMinimizer,
    pub struct_q: &'a [Exponents],
    pub domain: &'a DomainBox,
    pub max_restarts: usize,
    pub threshold: f64,
    pub parallel: bool,
}

impl RobustnessChecker<'_> {
    /// Draw the start point of every restart.
    fn start_points<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Vec<f64>> {
        let mut starts = Vec::with_capacity(self.max_restarts);
        for r in 0..self.max_restarts {
            if r == 0 {
                starts.push(self.domain.midpoint());
            } else {
                starts.push(self.domain.sample(rng));
            }
        }
        starts
    }

    fn restart(&self, qcoeff: &[f64], start: &[f64]) -> RestartRecord {
        let objective = |x: &[f64]| denominator_with_gradient(qcoeff, x, self.struct_q);
        let out = self.minimizer.minimize(&objective, self.domain, start.to_vec());
        RestartRecord {
            start: start.to_vec(),
            point: out.x,
            objective: out.value,
            status: out.status,
        }
    }

    /// Search for the weakest denominator value over the domain box.
    pub fn check<R: Rng + ?Sized>(&self, qcoeff: &[f64], rng: &mut R) -> RobustnessReport {
        let starts = self.start_points(rng);

        let records: Vec<RestartRecord> = if self.parallel {
            let all: Vec<RestartRecord> = starts.par_iter().map(|s| self.restart(qcoeff, s)).collect();
            truncate_at_violation(all, self.threshold)
        } else {
            let mut out = Vec::with_capacity(starts.len());
            for s in &starts {
                let rec = self.restart(qcoeff, s);
                let violated = rec.objective < self.threshold;
                out.push(rec);
                if violated {
                    break;
                }
            }
            out
        };

        let mut best: Option<&RestartRecord> = None;
        for rec in &records {
            match best {
                Some(b) if !(rec.objective < b.objective) => {}
                _ => best = Some(rec),
            }
        }

        let (point, objective) = best
            .map(|b| (b.point.clone(), b.objective))
            .unwrap_or_else(|| (self.domain.midpoint(), f64::INFINITY));

        let summary = RestartSummary {
            elapsed_secs: records.iter().map(|r| r.status.elapsed_secs).sum(),
            restarts: records.len(),
        };

        RobustnessReport {
            point,
            objective,
            restarts: records,
            summary,
        }
    }
}

/// Keep restarts up to and including the first one below `threshold`.
fn truncate_at_violation(mut records: Vec<RestartRecord>, threshold: f64) -> Vec<RestartRecord> {
    if let Some(idx) = records.iter().position(|r| r.objective < threshold) {
        records.truncate(idx + 1);
    }
    records
}
