//! Box-constrained local minimizers.
//!
//! Both backends iterate `x ← P(x + α d)` where `P` clamps onto the box and `α` is
//! found by Armijo backtracking along the projection arc. Variables pinned at a
//! bound (with the gradient pushing outward) are frozen for the direction
//! computation.
//!
//! - [`ProjectedLbfgs`]: `d` from the two-loop L-BFGS recursion over free variables
//! - [`ProjectedGradient`]: `d = -∇f` over free variables
//!
//! Termination mirrors L-BFGS-B: projected-gradient sup-norm below `pgtol`, or a
//! relative decrease `(f_k - f_{k+1}) / max(|f_k|, |f_{k+1}|, 1) <= ftol`.

use std::time::Instant;

use crate::domain::DomainBox;
use crate::math::dot;

use super::{codes, status, BoundedMinimizer, BoundedMinimum, BoundedObjective};

const EPS: f64 = 1e-12;
const ARMIJO_C1: f64 = 1e-4;
const BACKTRACK: f64 = 0.5;
const MAX_BACKTRACKS: usize = 40;

/// Shared stopping configuration.
#[derive(Debug, Clone, Copy)]
pub struct BoxSearchOptions {
    pub max_iter: usize,
    pub ftol: f64,
    pub pgtol: f64,
}

impl Default for BoxSearchOptions {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            ftol: 1e-4,
            pgtol: 1e-8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectedLbfgs {
    pub options: BoxSearchOptions,
    pub history: usize,
}

impl ProjectedLbfgs {
    pub fn new(max_iter: usize, ftol: f64) -> Self {
        Self {
            options: BoxSearchOptions {
                max_iter,
                ftol,
                ..BoxSearchOptions::default()
            },
            history: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectedGradient {
    pub options: BoxSearchOptions,
}

impl ProjectedGradient {
    pub fn new(max_iter: usize, ftol: f64) -> Self {
        Self {
            options: BoxSearchOptions {
                max_iter,
                ftol,
                ..BoxSearchOptions::default()
            },
        }
    }
}

impl BoundedMinimizer for ProjectedLbfgs {
    fn minimize(&self, objective: &BoundedObjective<'_>, bounds: &DomainBox, x0: Vec<f64>) -> BoundedMinimum {
        run_projected(objective, bounds, x0, self.options, self.history)
    }
}

impl BoundedMinimizer for ProjectedGradient {
    fn minimize(&self, objective: &BoundedObjective<'_>, bounds: &DomainBox, x0: Vec<f64>) -> BoundedMinimum {
        run_projected(objective, bounds, x0, self.options, 0)
    }
}

#[derive(Debug, Clone)]
struct HistoryPair {
    s: Vec<f64>,
    y: Vec<f64>,
    rho: f64,
}

#[derive(Debug, Default)]
struct LbfgsMemory {
    pairs: Vec<HistoryPair>,
}

impl LbfgsMemory {
    fn update(&mut self, s: Vec<f64>, y: Vec<f64>, capacity: usize) {
        if capacity == 0 {
            return;
        }
        let sy = dot(&s, &y);
        let s_norm = dot(&s, &s).sqrt();
        let y_norm = dot(&y, &y).sqrt();
        if !sy.is_finite() || sy <= 1e-10 * s_norm * y_norm || sy <= 0.0 {
            return;
        }
        self.pairs.push(HistoryPair { s, y, rho: 1.0 / sy });
        if self.pairs.len() > capacity {
            let overflow = self.pairs.len() - capacity;
            self.pairs.drain(0..overflow);
        }
    }

    fn clear(&mut self) {
        self.pairs.clear();
    }

    /// Two-loop recursion restricted to the free variables.
    fn direction(&self, grad: &[f64], free: &[bool]) -> Vec<f64> {
        let masked = |v: &[f64]| -> Vec<f64> {
            v.iter()
                .zip(free.iter())
                .map(|(&vi, &f)| if f { vi } else { 0.0 })
                .collect()
        };

        let mut q = masked(grad);
        let mut alphas = Vec::with_capacity(self.pairs.len());
        for pair in self.pairs.iter().rev() {
            let alpha = pair.rho * dot(&masked(&pair.s), &q);
            for i in 0..q.len() {
                if free[i] {
                    q[i] -= alpha * pair.y[i];
                }
            }
            alphas.push(alpha);
        }

        let gamma = self
            .pairs
            .last()
            .map(|p| {
                let yy = dot(&p.y, &p.y);
                if yy > 0.0 { 1.0 / (p.rho * yy) } else { 1.0 }
            })
            .unwrap_or(1.0);
        let mut r: Vec<f64> = q.iter().map(|v| v * gamma).collect();

        for (pair, alpha) in self.pairs.iter().zip(alphas.into_iter().rev()) {
            let beta = pair.rho * dot(&masked(&pair.y), &r);
            for i in 0..r.len() {
                if free[i] {
                    r[i] += pair.s[i] * (alpha - beta);
                }
            }
        }

        r.iter().map(|v| -v).collect()
    }
}

fn projected_grad_component(x: f64, g: f64, lo: f64, hi: f64) -> f64 {
    if (hi - lo).abs() <= EPS {
        0.0
    } else if x <= lo + EPS * (1.0 + lo.abs()) {
        g.min(0.0)
    } else if x >= hi - EPS * (1.0 + hi.abs()) {
        g.max(0.0)
    } else {
        g
    }
}

fn projected_grad_norm(x: &[f64], g: &[f64], bounds: &DomainBox) -> f64 {
    x.iter()
        .zip(g.iter())
        .zip(bounds.lower.iter().zip(bounds.upper.iter()))
        .map(|((&xj, &gj), (&lo, &hi))| projected_grad_component(xj, gj, lo, hi).abs())
        .fold(0.0, f64::max)
}

fn free_mask(x: &[f64], g: &[f64], bounds: &DomainBox) -> Vec<bool> {
    x.iter()
        .zip(g.iter())
        .zip(bounds.lower.iter().zip(bounds.upper.iter()))
        .map(|((&xj, &gj), (&lo, &hi))| {
            if (hi - lo).abs() <= EPS {
                return false;
            }
            let pinned_lower = xj <= lo + EPS * (1.0 + lo.abs()) && gj > 0.0;
            let pinned_upper = xj >= hi - EPS * (1.0 + hi.abs()) && gj < 0.0;
            !(pinned_lower || pinned_upper)
        })
        .collect()
}

/// Steepest-descent direction over free variables, scaled so its largest component
/// spans the box's widest free side.
fn scaled_descent(g: &[f64], free: &[bool], bounds: &DomainBox) -> Vec<f64> {
    let gmax = g
        .iter()
        .zip(free.iter())
        .filter(|(_, f)| **f)
        .fold(0.0_f64, |acc, (v, _)| acc.max(v.abs()));
    if gmax <= 0.0 {
        return vec![0.0; g.len()];
    }
    let width = bounds
        .lower
        .iter()
        .zip(bounds.upper.iter())
        .zip(free.iter())
        .filter(|(_, f)| **f)
        .fold(0.0_f64, |acc, ((lo, hi), _)| acc.max(hi - lo));
    let scale = width.max(EPS) / gmax;
    g.iter()
        .zip(free.iter())
        .map(|(&gi, &f)| if f { -gi * scale } else { 0.0 })
        .collect()
}

fn run_projected(
    objective: &BoundedObjective<'_>,
    bounds: &DomainBox,
    x0: Vec<f64>,
    opts: BoxSearchOptions,
    history: usize,
) -> BoundedMinimum {
    let start = Instant::now();
    let mut x = x0;
    bounds.project(&mut x);
    let (mut f, mut g) = objective(&x);
    let mut memory = LbfgsMemory::default();

    let finish = |x: Vec<f64>, f: f64, code: i32, message: &str, iterations: usize| BoundedMinimum {
        x,
        value: f,
        status: status(code, message, iterations, start.elapsed().as_secs_f64()),
    };

    if !f.is_finite() || g.iter().any(|v| !v.is_finite()) {
        return finish(x, f, codes::NON_FINITE, "Objective or gradient is non-finite", 0);
    }

    for it in 0..opts.max_iter {
        if projected_grad_norm(&x, &g, bounds) <= opts.pgtol {
            return finish(x, f, codes::SUCCESS, "Projected gradient below tolerance", it);
        }

        let free = free_mask(&x, &g, bounds);
        let mut d = if memory.pairs.is_empty() {
            scaled_descent(&g, &free, bounds)
        } else {
            memory.direction(&g, &free)
        };
        let slope = dot(&g, &d);
        if !slope.is_finite() || slope >= 0.0 || d.iter().any(|v| !v.is_finite()) {
            memory.clear();
            d = scaled_descent(&g, &free, bounds);
        }

        let mut alpha = 1.0_f64;
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let mut x_trial: Vec<f64> = x.iter().zip(d.iter()).map(|(&xi, &di)| xi + alpha * di).collect();
            bounds.project(&mut x_trial);
            let step: Vec<f64> = x_trial.iter().zip(x.iter()).map(|(a, b)| a - b).collect();
            if step.iter().all(|v| v.abs() <= 1e-15) {
                break;
            }
            let (f_trial, g_trial) = objective(&x_trial);
            if f_trial.is_finite() && f_trial <= f + ARMIJO_C1 * dot(&g, &step) {
                accepted = Some((x_trial, f_trial, g_trial, step));
                break;
            }
            alpha *= BACKTRACK;
        }

        let Some((x_new, f_new, g_new, step)) = accepted else {
            if !memory.pairs.is_empty() {
                // Retry from steepest descent on the next pass.
                memory.clear();
                continue;
            }
            return finish(x, f, codes::LINE_SEARCH_FAILED, "Line search could not make progress", it);
        };

        if g_new.iter().any(|v| !v.is_finite()) {
            return finish(x_new, f_new, codes::NON_FINITE, "Gradient became non-finite", it + 1);
        }

        let y: Vec<f64> = g_new.iter().zip(g.iter()).map(|(a, b)| a - b).collect();
        memory.update(step, y, history);

        let f_prev = f;
        x = x_new;
        f = f_new;
        g = g_new;

        if (f_prev - f) / f_prev.abs().max(f.abs()).max(1.0) <= opts.ftol {
            return finish(x, f, codes::SUCCESS, "Relative reduction of f below ftol", it + 1);
        }
    }

    finish(x, f, codes::ITERATION_LIMIT, "Iteration limit reached", opts.max_iter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bowl(x: &[f64]) -> (f64, Vec<f64>) {
        let f = (x[0] - 0.3).powi(2) + 4.0 * (x[1] + 0.2).powi(2);
        (f, vec![2.0 * (x[0] - 0.3), 8.0 * (x[1] + 0.2)])
    }

    fn tilted_plane(x: &[f64]) -> (f64, Vec<f64>) {
        (1.0 + 0.5 * x[0] - 0.25 * x[1], vec![0.5, -0.25])
    }

    #[test]
    fn lbfgs_finds_interior_minimum() {
        let b = DomainBox::new(vec![-1.0, -1.0], vec![1.0, 1.0]);
        let mut solver = ProjectedLbfgs::new(1000, 1e-12);
        solver.options.pgtol = 1e-9;
        let out = solver.minimize(&bowl, &b, vec![0.9, 0.9]);
        assert!(out.status.success(), "{:?}", out.status);
        assert!((out.x[0] - 0.3).abs() < 1e-4, "{:?}", out.x);
        assert!((out.x[1] + 0.2).abs() < 1e-4, "{:?}", out.x);
    }

    #[test]
    fn linear_objective_goes_to_corner() {
        let b = DomainBox::new(vec![-1.0, -1.0], vec![1.0, 1.0]);
        for solver in [
            Box::new(ProjectedLbfgs::new(100, 1e-4)) as Box<dyn BoundedMinimizer>,
            Box::new(ProjectedGradient::new(100, 1e-4)),
        ] {
            let out = solver.minimize(&tilted_plane, &b, vec![0.0, 0.0]);
            assert_eq!(out.x, vec![-1.0, 1.0]);
            assert!((out.value - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn start_outside_box_is_projected() {
        let b = DomainBox::new(vec![0.0, 0.0], vec![1.0, 1.0]);
        let out = ProjectedGradient::new(200, 1e-10).minimize(&bowl, &b, vec![5.0, -5.0]);
        assert!(b.contains(&out.x));
        assert!((out.x[0] - 0.3).abs() < 1e-3, "{:?}", out.x);
        assert!(out.x[1].abs() < 1e-12);
    }
}
