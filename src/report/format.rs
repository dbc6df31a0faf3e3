//! Residuals and formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{DomainBox, FitConfig, FitResult, IterationRecord};
use crate::io::ingest::IngestedData;
use crate::models::RationalApproximation;

/// Fit quality at the training samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualStats {
    pub max_abs: f64,
    pub rmse: f64,
    /// Smallest denominator value seen at a sample.
    pub min_denominator: f64,
}

/// Compare model predictions against the sampled values.
pub fn compute_residuals(model: &RationalApproximation, points: &[Vec<f64>], values: &[f64]) -> ResidualStats {
    let mut max_abs = 0.0_f64;
    let mut sse = 0.0;
    let mut min_denominator = f64::INFINITY;
    for (x, &y) in points.iter().zip(values.iter()) {
        let r = y - model.value(x);
        max_abs = max_abs.max(r.abs());
        sse += r * r;
        min_denominator = min_denominator.min(model.denominator(x));
    }
    let n = points.len().max(1) as f64;
    ResidualStats {
        max_abs,
        rmse: (sse / n).sqrt(),
        min_denominator,
    }
}

/// Format the full run summary (dataset stats + configuration + accepted model).
pub fn format_run_summary(ingest: &IngestedData, result: &FitResult, config: &FitConfig) -> String {
    let mut out = String::new();

    out.push_str("=== rapp - Robust Rational Approximation ===\n");
    out.push_str(&format!(
        "Points: n={} (read {}, skipped {}) | dim={}\n",
        ingest.stats.n_points,
        ingest.rows_read,
        ingest.row_errors.len(),
        ingest.stats.dim
    ));
    for (i, name) in ingest.coord_names.iter().enumerate() {
        out.push_str(&format!(
            "  {:<12} [{:.4}, {:.4}]\n",
            truncate(name, 12),
            ingest.stats.coord_min[i],
            ingest.stats.coord_max[i]
        ));
    }
    out.push_str(&format!(
        "  {:<12} [{:.4}, {:.4}] (value)\n",
        truncate(&ingest.value_name, 12),
        ingest.stats.value_min,
        ingest.stats.value_max
    ));
    for e in ingest.row_errors.iter().take(5) {
        out.push_str(&format!("  (line {}) {}\n", e.line, e.message));
    }

    out.push_str(&format!(
        "Order: m={} n={} | terms M={} N={}\n",
        result.m,
        result.n,
        result.pcoeff.len(),
        result.qcoeff.len()
    ));
    out.push_str(&format!(
        "Domain: raw {} -> scaled {}\n",
        fmt_box(&result.scaler.box_raw()),
        fmt_box(&result.domain)
    ));
    out.push_str(&format!(
        "Threshold: {} | restarts<={} | method={} | seed={}\n",
        config.threshold,
        config.max_restarts,
        config.method.display_name(),
        config.seed
    ));

    out.push_str("\nIterations:\n");
    out.push_str(&format_history(&result.history));

    let model = RationalApproximation::from_fit_result(result);
    let stats = compute_residuals(&model, &ingest.points, &ingest.values);

    out.push_str("\nAccepted model:\n");
    out.push_str(&format!("- pcoeff: {}\n", fmt_vec(&result.pcoeff)));
    out.push_str(&format!("- qcoeff: {}\n", fmt_vec(&result.qcoeff)));
    out.push_str(&format!("- robust min q: {:.6}\n", result.robust_objective()));
    out.push_str(&format!(
        "- residuals: max|r|={:.3e} rmse={:.3e} | min q at samples={:.6}\n",
        stats.max_abs, stats.rmse, stats.min_denominator
    ));

    out
}

/// Format the per-pass history table.
pub fn format_history(history: &[IterationRecord]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>4} {:>6} {:>12} {:>12} {:>8} {:>9} {:<24}\n",
            "pass", "cons", "lsq", "min q", "restarts", "time(s)", "witness"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<4} {:-<6} {:-<12} {:-<12} {:-<8} {:-<9} {:-<24}\n",
            "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for (i, rec) in history.iter().enumerate() {
        out.push_str(
            format!(
                "{:>4} {:>6} {:>12.4e} {:>12.6} {:>8} {:>9.3} {:<24}\n",
                i + 1,
                rec.constraints,
                rec.least_squares,
                rec.robust.objective,
                rec.robust.summary.restarts,
                rec.fit_status.elapsed_secs + rec.robust.summary.elapsed_secs,
                truncate(&fmt_vec_short(&rec.robust.point), 24),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Format evaluations of a model at raw points.
pub fn format_evaluations(model: &RationalApproximation, points: &[Vec<f64>]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Model: m={} n={} dim={} | terms M={} N={}\n",
        model.m,
        model.n,
        model.dim(),
        model.m_terms(),
        model.n_terms()
    ));
    for x in points {
        let at = if model.coord_names.len() == x.len() {
            let parts: Vec<String> = model
                .coord_names
                .iter()
                .zip(x.iter())
                .map(|(name, v)| format!("{name}={v:.3}"))
                .collect();
            format!("({})", parts.join(","))
        } else {
            fmt_vec_short(x)
        };
        out.push_str(&format!(
            "{} -> {:.10} (p={:.6} q={:.6})\n",
            at,
            model.value(x),
            model.numerator(x),
            model.denominator(x)
        ));
    }
    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

fn fmt_box(b: &DomainBox) -> String {
    let parts: Vec<String> = b
        .lower
        .iter()
        .zip(b.upper.iter())
        .map(|(lo, hi)| format!("[{lo:.4}, {hi:.4}]"))
        .collect();
    parts.join(" x ")
}

fn fmt_vec_short(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.3}")).collect();
    format!("({})", parts.join(","))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
