//! Monomial basis structures and their evaluation.
//!
//! A structure is the ordered list of exponent tuples of every monomial with total
//! degree `<= degree` in `dim` variables. Ordering is by total degree first, then
//! lexicographically with the first coordinate's exponent highest:
//!
//! ```text
//! dim = 2, degree = 2:  1, x, y, x², xy, y²
//! ```
//!
//! The number of terms is `C(dim + degree, degree)`.

/// Exponent tuple of one monomial term.
pub type Exponents = Vec<u32>;

/// Number of monomials of total degree `<= degree` in `dim` variables.
pub fn term_count(dim: usize, degree: usize) -> usize {
    // C(dim + degree, degree) computed incrementally to stay exact for small inputs.
    let mut acc: usize = 1;
    for i in 1..=degree {
        acc = acc * (dim + i) / i;
    }
    acc
}

/// Generate the exponent structure for `dim` variables up to total degree `degree`.
pub fn structure(dim: usize, degree: usize) -> Vec<Exponents> {
    let mut out = Vec::with_capacity(term_count(dim, degree));
    for total in 0..=degree {
        let mut current = vec![0u32; dim];
        fill_degree(&mut out, &mut current, 0, total as u32);
    }
    out
}

fn fill_degree(out: &mut Vec<Exponents>, current: &mut [u32], pos: usize, remaining: u32) {
    if current.is_empty() {
        if remaining == 0 {
            out.push(Vec::new());
        }
        return;
    }
    if pos == current.len() - 1 {
        current[pos] = remaining;
        out.push(current.to_vec());
        current[pos] = 0;
        return;
    }
    for e in (0..=remaining).rev() {
        current[pos] = e;
        fill_degree(out, current, pos + 1, remaining - e);
    }
    current[pos] = 0;
}

/// Evaluate every monomial of `structure` at `x`.
///
/// # Panics
/// Panics if an exponent tuple is longer than `x`.
pub fn recurrence(x: &[f64], structure: &[Exponents]) -> Vec<f64> {
    structure
        .iter()
        .map(|exps| {
            exps.iter()
                .zip(x.iter())
                .map(|(&e, &xi)| xi.powi(e as i32))
                .product()
        })
        .collect()
}

/// Jacobian of [`recurrence`] with respect to `x`.
///
/// Row `k` holds `∂ basis_k / ∂ x_j` for `j in 0..dim`.
pub fn recurrence_gradient(x: &[f64], structure: &[Exponents]) -> Vec<Vec<f64>> {
    structure
        .iter()
        .map(|exps| {
            (0..x.len())
                .map(|j| {
                    let ej = exps.get(j).copied().unwrap_or(0);
                    if ej == 0 {
                        return 0.0;
                    }
                    let mut term = ej as f64 * x[j].powi(ej as i32 - 1);
                    for (i, (&e, &xi)) in exps.iter().zip(x.iter()).enumerate() {
                        if i != j {
                            term *= xi.powi(e as i32);
                        }
                    }
                    term
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_sizes_match_binomial() {
        for dim in 1..4 {
            for degree in 0..5 {
                assert_eq!(structure(dim, degree).len(), term_count(dim, degree));
            }
        }
        assert_eq!(term_count(2, 2), 6);
        assert_eq!(term_count(3, 3), 20);
    }

    #[test]
    fn structure_order_is_degree_then_lex() {
        let s = structure(2, 2);
        assert_eq!(
            s,
            vec![
                vec![0, 0],
                vec![1, 0],
                vec![0, 1],
                vec![2, 0],
                vec![1, 1],
                vec![0, 2],
            ]
        );
    }

    #[test]
    fn recurrence_evaluates_monomials() {
        let s = structure(2, 2);
        let b = recurrence(&[2.0, 3.0], &s);
        assert_eq!(b, vec![1.0, 2.0, 3.0, 4.0, 6.0, 9.0]);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let s = structure(3, 3);
        let x = [0.3, -0.7, 0.5];
        let jac = recurrence_gradient(&x, &s);
        let h = 1e-6;
        for j in 0..3 {
            let mut xp = x;
            let mut xm = x;
            xp[j] += h;
            xm[j] -= h;
            let bp = recurrence(&xp, &s);
            let bm = recurrence(&xm, &s);
            for k in 0..s.len() {
                let fd = (bp[k] - bm[k]) / (2.0 * h);
                assert!((fd - jac[k][j]).abs() < 1e-7, "term {k} dim {j}: {fd} vs {}", jac[k][j]);
            }
        }
    }
}
