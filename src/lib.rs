//! `robust-rational` library crate.
//!
//! Fits multivariate rational approximations `p(x) / q(x)` whose denominator is
//! certified to stay above a threshold over the whole sampling box.
//!
//! The binary (`rapp`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the fit engine is usable directly through [`fit::fit`]

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod solver;
