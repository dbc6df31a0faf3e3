//! Domain types used throughout the fit pipeline.
//!
//! This module defines:
//!
//! - run configuration (`FitConfig`, `LocalSearchMethod`)
//! - the domain box and solver bookkeeping (`DomainBox`, `SolverStatus`)
//! - fit outputs and diagnostics (`FitResult`, `IterationRecord`, `RestartRecord`)

pub mod types;

pub use types::*;
