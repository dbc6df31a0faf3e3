//! Read/write model and history JSON files.
//!
//! Model JSON is the portable form of a fitted approximation (schema:
//! `domain::ModelFile`). History JSON is the ordered list of outer-loop passes and is
//! written for failed runs too, so a run that never certified its denominator can
//! still be inspected.

use std::fs::File;
use std::path::Path;

use crate::domain::{FitResult, IterationRecord, ModelFile};
use crate::error::AppError;
use crate::models::RationalApproximation;

/// Write the model JSON for an accepted fit, labelling inputs with `coord_names`.
pub fn write_model_json(path: &Path, result: &FitResult, coord_names: &[String]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create model JSON '{}': {e}", path.display())))?;

    let model = RationalApproximation::from_fit_result(result)
        .with_coord_names(coord_names)
        .to_model_file(result.iterations(), result.robust_objective());

    serde_json::to_writer_pretty(file, &model)
        .map_err(|e| AppError::new(2, format!("Failed to write model JSON: {e}")))?;

    Ok(())
}

/// Read a model JSON file.
pub fn read_model_json(path: &Path) -> Result<RationalApproximation, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open model JSON '{}': {e}", path.display())))?;
    let model: ModelFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid model JSON: {e}")))?;
    Ok(RationalApproximation::from_model_file(model)?)
}

/// Write the iteration history.
pub fn write_history_json(path: &Path, history: &[IterationRecord]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create history JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, history)
        .map_err(|e| AppError::new(2, format!("Failed to write history JSON: {e}")))?;
    Ok(())
}
