//! Robust rational fitting.
//!
//! Responsibilities:
//!
//! - build training basis matrices and the least-squares objective
//! - solve the constrained fit step (with randomized retries)
//! - search the domain box for weak denominator values (multi-restart, optionally parallel)
//! - drive the outer loop until the denominator is certified or the cap is reached

pub mod constraints;
pub mod controller;
pub mod fitter;
pub mod objective;
pub mod robustness;
pub mod training;

pub use constraints::*;
pub use controller::*;
pub use fitter::*;
pub use objective::*;
pub use robustness::*;
pub use training::*;
