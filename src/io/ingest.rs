//! CSV ingest and validation.
//!
//! Input layout: one header row, then one sample per row. Every column except the
//! last is a coordinate; the last column is the sampled value.
//!
//! - **Strict schema**: at least two columns (clear errors + exit code 2)
//! - **Row-level validation**: bad rows are skipped and reported, not fatal
//! - **No fitting logic** here

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::error::AppError;

/// Summary stats about the rows actually used for fitting.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub n_points: usize,
    pub dim: usize,
    pub coord_min: Vec<f64>,
    pub coord_max: Vec<f64>,
    pub value_min: f64,
    pub value_max: f64,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: coordinates + values + column names + stats + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub coord_names: Vec<String>,
    pub value_name: String,
    pub points: Vec<Vec<f64>>,
    pub values: Vec<f64>,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl IngestedData {
    pub fn rows_used(&self) -> usize {
        self.points.len()
    }
}

/// Load samples from a CSV file.
pub fn load_samples(path: &Path) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_samples(file)
}

/// Parse samples from any CSV source.
pub fn read_samples<R: Read>(source: R) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();

    let names: Vec<String> = headers.iter().map(normalize_header_name).collect();
    if names.len() < 2 {
        return Err(AppError::new(
            2,
            "CSV needs at least one coordinate column and a value column.",
        ));
    }
    let width = names.len();
    let (coord_names, value_name) = (names[..width - 1].to_vec(), names[width - 1].clone());

    let mut points = Vec::new();
    let mut values = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header; CSV lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, width) {
            Ok((x, y)) => {
                points.push(x);
                values.push(y);
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    let stats = compute_stats(&points, &values)
        .ok_or_else(|| AppError::new(2, "No valid rows remain after parsing."))?;

    Ok(IngestedData {
        coord_names,
        value_name,
        points,
        values,
        stats,
        row_errors,
        rows_read,
    })
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a BOM.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

fn parse_row(record: &StringRecord, width: usize) -> Result<(Vec<f64>, f64), String> {
    if record.len() != width {
        return Err(format!("Expected {width} fields, found {}", record.len()));
    }
    let mut fields = Vec::with_capacity(width);
    for (col, raw) in record.iter().enumerate() {
        let v: f64 = raw
            .parse()
            .map_err(|_| format!("Column {} is not a number: '{raw}'", col + 1))?;
        if !v.is_finite() {
            return Err(format!("Column {} is not finite: '{raw}'", col + 1));
        }
        fields.push(v);
    }
    let y = fields.pop().ok_or_else(|| "Empty row".to_string())?;
    Ok((fields, y))
}

fn compute_stats(points: &[Vec<f64>], values: &[f64]) -> Option<DatasetStats> {
    let dim = points.first()?.len();
    let mut coord_min = vec![f64::INFINITY; dim];
    let mut coord_max = vec![f64::NEG_INFINITY; dim];
    for p in points {
        for (i, &v) in p.iter().enumerate() {
            coord_min[i] = coord_min[i].min(v);
            coord_max[i] = coord_max[i].max(v);
        }
    }
    let value_min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let value_max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(DatasetStats {
        n_points: points.len(),
        dim,
        coord_min,
        coord_max,
        value_min,
        value_max,
    })
}
