//! Command-line parsing for the robust rational fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting code.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};

use crate::domain::LocalSearchMethod;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "rapp", version, about = "Robust multivariate rational approximation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit p/q to CSV samples, print a run summary, and optionally export the model.
    Fit(FitArgs),
    /// Evaluate a saved model at one or more points.
    Eval(EvalArgs),
}

/// Numerator/denominator total degrees, written `M,N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub m: usize,
    pub n: usize,
}

impl FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (m, n) = s
            .split_once(',')
            .ok_or_else(|| format!("expected `M,N`, got '{s}'"))?;
        let m = m.trim().parse().map_err(|_| format!("invalid numerator degree '{m}'"))?;
        let n = n.trim().parse().map_err(|_| format!("invalid denominator degree '{n}'"))?;
        Ok(Order { m, n })
    }
}

/// A comma-separated point, e.g. `0.5,1.25`.
#[derive(Debug, Clone, PartialEq)]
pub struct Point(pub Vec<f64>);

impl FromStr for Point {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(|c| c.trim().parse::<f64>().map_err(|_| format!("invalid coordinate '{c}'")))
            .collect::<Result<Vec<_>, _>>()
            .map(Point)
    }
}

/// Options for fitting.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// CSV with a header row; the last column is the value, the others are coordinates.
    #[arg(short = 'i', long, value_name = "CSV")]
    pub input: PathBuf,

    /// Numerator and denominator total degrees.
    #[arg(short = 'o', long, value_name = "M,N")]
    pub order: Order,

    /// Minimum acceptable denominator value over the domain box.
    #[arg(short = 't', long, default_value_t = 0.02)]
    pub threshold: f64,

    /// Outer-loop iteration cap.
    #[arg(long, default_value_t = 1000)]
    pub max_iterations: usize,

    /// Local-search restarts per robustness check.
    #[arg(long, default_value_t = 100)]
    pub max_restarts: usize,

    /// Random seed (fit retries and restart start points).
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Bounded local-search method for the robustness check.
    #[arg(long, value_enum, default_value_t = LocalSearchMethod::ProjectedLbfgs)]
    pub method: LocalSearchMethod,

    /// Run robustness restarts in parallel.
    #[arg(long)]
    pub parallel: bool,

    /// Lower end of the scaled domain.
    #[arg(long, default_value_t = -1.0, allow_hyphen_values = true)]
    pub scale_min: f64,

    /// Upper end of the scaled domain.
    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    pub scale_max: f64,

    /// Randomized re-runs allowed when the constrained fit does not converge.
    #[arg(long, default_value_t = 100)]
    pub max_fit_retries: usize,

    /// Verbose solver tracing.
    #[arg(long)]
    pub debug: bool,

    /// Export the fitted model to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,

    /// Export the iteration history to JSON (also written when the fit fails).
    #[arg(long, value_name = "JSON")]
    pub history: Option<PathBuf>,
}

/// Options for evaluating a saved model.
#[derive(Debug, Parser)]
pub struct EvalArgs {
    /// Model JSON file produced by `rapp fit --export`.
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,

    /// Raw point to evaluate (repeatable).
    #[arg(long = "at", value_name = "X1,X2,...", required = true, allow_hyphen_values = true)]
    pub at: Vec<Point>,
}
