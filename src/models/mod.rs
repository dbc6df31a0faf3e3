//! Fitted rational models.
//!
//! A model is a pair of coefficient vectors plus the exponent structures and the
//! scaler needed to evaluate it on raw coordinates.

pub mod rational;

pub use rational::*;
