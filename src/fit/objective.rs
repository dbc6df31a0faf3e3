//! Linearized least-squares objective and its exact gradient.
//!
//! The residual avoids dividing by the denominator:
//!
//! ```text
//! r_t  = Y_t (c_q · Q_t) - (c_p · P_t)
//! f(c) = Σ_t r_t²
//! ∂f/∂c_p = -2 Σ_t r_t P_t
//! ∂f/∂c_q =  2 Σ_t r_t Y_t Q_t
//! ```
//!
//! `c` always holds the numerator block first (`M` entries) followed by the
//! denominator block (`N` entries).

use nalgebra::DVector;

use super::training::TrainingSet;

fn residuals(coeff: &DVector<f64>, ts: &TrainingSet) -> DVector<f64> {
    let (m, n) = (ts.m_terms(), ts.n_terms());
    let cp = coeff.rows(0, m);
    let cq = coeff.rows(m, n);
    let qv = &ts.q * cq;
    let pv = &ts.p * cp;
    ts.y.component_mul(&qv) - pv
}

pub fn least_squares(coeff: &DVector<f64>, ts: &TrainingSet) -> f64 {
    residuals(coeff, ts).norm_squared()
}

pub fn least_squares_gradient(coeff: &DVector<f64>, ts: &TrainingSet) -> DVector<f64> {
    let (m, n) = (ts.m_terms(), ts.n_terms());
    let r = residuals(coeff, ts);
    let gp = ts.p.tr_mul(&r) * -2.0;
    let gq = ts.q.tr_mul(&r.component_mul(&ts.y)) * 2.0;

    let mut grad = DVector::<f64>::zeros(m + n);
    grad.rows_mut(0, m).copy_from(&gp);
    grad.rows_mut(m, n).copy_from(&gq);
    grad
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::structure;

    fn small_set() -> TrainingSet {
        let pts: Vec<Vec<f64>> = (0..6).map(|i| vec![-1.0 + 0.4 * i as f64]).collect();
        let ys: Vec<f64> = pts.iter().map(|x| (1.0 + 0.5 * x[0]) / (2.0 + x[0])).collect();
        TrainingSet::new(pts, &ys, &structure(1, 1), &structure(1, 1))
    }

    #[test]
    fn exact_coefficients_give_zero_objective() {
        let ts = small_set();
        let c = DVector::from_vec(vec![1.0, 0.5, 2.0, 1.0]);
        assert!(least_squares(&c, &ts) < 1e-24);
        assert!(least_squares_gradient(&c, &ts).amax() < 1e-12);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let ts = small_set();
        let c = DVector::from_vec(vec![0.3, -1.1, 0.7, 2.2]);
        let g = least_squares_gradient(&c, &ts);
        let h = 1e-6;
        for i in 0..c.len() {
            let mut cp = c.clone();
            let mut cm = c.clone();
            cp[i] += h;
            cm[i] -= h;
            let fd = (least_squares(&cp, &ts) - least_squares(&cm, &ts)) / (2.0 * h);
            assert!((fd - g[i]).abs() < 1e-6 * fd.abs().max(1.0), "component {i}: {fd} vs {}", g[i]);
        }
    }
}
