//! Reporting utilities: sample residuals and formatted terminal output.

pub mod format;

pub use format::*;
