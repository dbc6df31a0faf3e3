//! Shared "fit pipeline" logic.
//!
//! CSV ingest -> robust rational fit -> optional exports. The caller only handles
//! presentation.

use std::path::{Path, PathBuf};

use crate::domain::{FitConfig, FitResult};
use crate::error::AppError;
use crate::io::ingest::{load_samples, IngestedData};

/// Where to write optional outputs.
#[derive(Debug, Clone, Default)]
pub struct Exports {
    pub model: Option<PathBuf>,
    pub history: Option<PathBuf>,
}

/// All computed outputs of a single `rapp fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub result: FitResult,
}

/// Execute the full fitting pipeline from a CSV file.
pub fn run_fit(input: &Path, config: &FitConfig, exports: &Exports) -> Result<RunOutput, AppError> {
    let ingest = load_samples(input)?;
    if !ingest.row_errors.is_empty() {
        tracing::warn!(
            skipped = ingest.row_errors.len(),
            used = ingest.rows_used(),
            "some CSV rows were skipped"
        );
    }
    run_fit_with_data(ingest, config, exports)
}

/// Execute the fitting pipeline on already ingested samples.
///
/// The history is written whenever it exists, including for a fit that exhausted
/// its iteration cap.
pub fn run_fit_with_data(ingest: IngestedData, config: &FitConfig, exports: &Exports) -> Result<RunOutput, AppError> {
    let outcome = crate::fit::fit(&ingest.points, &ingest.values, config);

    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            if let (Some(path), Some(history)) = (&exports.history, err.history()) {
                crate::io::export::write_history_json(path, history)?;
                tracing::info!(path = %path.display(), "wrote iteration history");
            }
            return Err(err.into());
        }
    };

    if let Some(path) = &exports.history {
        crate::io::export::write_history_json(path, &result.history)?;
    }
    if let Some(path) = &exports.model {
        crate::io::export::write_model_json(path, &result, &ingest.coord_names)?;
        tracing::info!(path = %path.display(), "wrote model");
    }

    Ok(RunOutput { ingest, result })
}
