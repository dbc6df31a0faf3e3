//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - installs the log subscriber
//! - runs the fit pipeline or evaluates a saved model
//! - prints reports

use clap::Parser;
use tracing::Level;

use crate::cli::{Command, EvalArgs, FitArgs};
use crate::domain::FitConfig;
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `rapp` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    let debug = matches!(&cli.command, Command::Fit(args) if args.debug);
    init_logging(debug);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Eval(args) => handle_eval(args),
    }
}

fn init_logging(debug: bool) {
    // Solver passes log at trace level, so `--debug` opens everything.
    let level = if debug { Level::TRACE } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let exports = pipeline::Exports {
        model: args.export.clone(),
        history: args.history.clone(),
    };
    let run = pipeline::run_fit(&args.input, &config, &exports)?;

    println!("{}", crate::report::format_run_summary(&run.ingest, &run.result, &config));
    Ok(())
}

fn handle_eval(args: EvalArgs) -> Result<(), AppError> {
    let model = crate::io::export::read_model_json(&args.model)?;

    let points: Vec<Vec<f64>> = args.at.into_iter().map(|p| p.0).collect();
    if let Some(bad) = points.iter().find(|p| p.len() != model.dim()) {
        return Err(AppError::new(
            2,
            format!(
                "Point has {} coordinates but the model expects {}.",
                bad.len(),
                model.dim()
            ),
        ));
    }

    print!("{}", crate::report::format_evaluations(&model, &points));
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        m: args.order.m,
        n: args.order.n,
        max_iterations: args.max_iterations,
        max_restarts: args.max_restarts,
        threshold: args.threshold,
        method: args.method,
        debug: args.debug,
        seed: args.seed,
        scale_min: args.scale_min,
        scale_max: args.scale_max,
        max_fit_retries: args.max_fit_retries,
        parallel_restarts: args.parallel,
        ..FitConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LocalSearchMethod;

    #[test]
    fn config_from_args_keeps_solver_defaults() {
        let cli = crate::cli::Cli::parse_from([
            "rapp", "fit", "-i", "d.csv", "-o", "3,2", "--max-restarts", "7", "--seed", "9", "--debug",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let cfg = fit_config_from_args(&args);
        assert_eq!((cfg.m, cfg.n), (3, 2));
        assert_eq!(cfg.max_restarts, 7);
        assert_eq!(cfg.seed, 9);
        assert!(cfg.debug);
        assert_eq!(cfg.method, LocalSearchMethod::ProjectedLbfgs);
        assert_eq!(cfg.fit_max_iter, 1001);
        assert_eq!(cfg.search_ftol, 1e-4);
        assert_eq!(cfg.threshold, 0.02);
    }
}
