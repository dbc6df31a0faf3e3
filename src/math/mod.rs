//! Mathematical collaborators: coordinate scaling and monomial bases.

pub mod monomial;
pub mod scaler;

pub use monomial::{recurrence, recurrence_gradient, structure, term_count, Exponents};
pub use scaler::Scaler;

/// Plain dot product over the shorter of the two slices.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
