//! Evaluation of a fitted `p(x) / q(x)`.

use crate::domain::{FitResult, ModelFile};
use crate::error::FitError;
use crate::math::{dot, recurrence, Exponents, Scaler};

const TOOL_NAME: &str = "rapp";

#[derive(Debug, Clone, PartialEq)]
pub struct RationalApproximation {
    pub m: usize,
    pub n: usize,
    pub coord_names: Vec<String>,
    pub scaler: Scaler,
    pub struct_p: Vec<Exponents>,
    pub struct_q: Vec<Exponents>,
    pub pcoeff: Vec<f64>,
    pub qcoeff: Vec<f64>,
}

impl RationalApproximation {
    pub fn from_fit_result(result: &FitResult) -> Self {
        Self {
            m: result.m,
            n: result.n,
            coord_names: Vec::new(),
            scaler: result.scaler.clone(),
            struct_p: result.struct_p.clone(),
            struct_q: result.struct_q.clone(),
            pcoeff: result.pcoeff.clone(),
            qcoeff: result.qcoeff.clone(),
        }
    }

    /// Attach input coordinate names (ignored unless there is one per dimension).
    pub fn with_coord_names(mut self, names: &[String]) -> Self {
        if names.len() == self.dim() {
            self.coord_names = names.to_vec();
        }
        self
    }

    /// Rebuild a model from its JSON form, checking that the pieces agree.
    pub fn from_model_file(file: ModelFile) -> Result<Self, FitError> {
        let invalid = |msg: String| Err(FitError::InvalidConfiguration(msg));
        if file.pcoeff.len() != file.struct_p.len() {
            return invalid(format!(
                "Numerator has {} coefficients but {} terms.",
                file.pcoeff.len(),
                file.struct_p.len()
            ));
        }
        if file.qcoeff.len() != file.struct_q.len() {
            return invalid(format!(
                "Denominator has {} coefficients but {} terms.",
                file.qcoeff.len(),
                file.struct_q.len()
            ));
        }
        if file.scaler.dim() != file.dim
            || file.struct_p.iter().chain(file.struct_q.iter()).any(|e| e.len() != file.dim)
        {
            return invalid(format!("Model dimension {} does not match its structures.", file.dim));
        }
        if !file.coord_names.is_empty() && file.coord_names.len() != file.dim {
            return invalid(format!(
                "Model names {} coordinates but has dimension {}.",
                file.coord_names.len(),
                file.dim
            ));
        }
        Ok(Self {
            m: file.m,
            n: file.n,
            coord_names: file.coord_names,
            scaler: file.scaler,
            struct_p: file.struct_p,
            struct_q: file.struct_q,
            pcoeff: file.pcoeff,
            qcoeff: file.qcoeff,
        })
    }

    pub fn to_model_file(&self, iterations: usize, robust_objective: f64) -> ModelFile {
        ModelFile {
            tool: TOOL_NAME.to_string(),
            generated_at: chrono::Utc::now(),
            m: self.m,
            n: self.n,
            dim: self.dim(),
            coord_names: self.coord_names.clone(),
            scaler: self.scaler.clone(),
            struct_p: self.struct_p.clone(),
            struct_q: self.struct_q.clone(),
            pcoeff: self.pcoeff.clone(),
            qcoeff: self.qcoeff.clone(),
            iterations,
            robust_objective,
        }
    }

    pub fn dim(&self) -> usize {
        self.scaler.dim()
    }

    /// Numerator term count `M`.
    pub fn m_terms(&self) -> usize {
        self.pcoeff.len()
    }

    /// Denominator term count `N`.
    pub fn n_terms(&self) -> usize {
        self.qcoeff.len()
    }

    /// `p(x)` at a raw point.
    pub fn numerator(&self, x: &[f64]) -> f64 {
        dot(&self.pcoeff, &recurrence(&self.scaler.scale(x), &self.struct_p))
    }

    /// `q(x)` at a raw point.
    pub fn denominator(&self, x: &[f64]) -> f64 {
        dot(&self.qcoeff, &recurrence(&self.scaler.scale(x), &self.struct_q))
    }

    /// `p(x) / q(x)` at a raw point.
    pub fn value(&self, x: &[f64]) -> f64 {
        self.value_scaled(&self.scaler.scale(x))
    }

    /// `p(s) / q(s)` at an already scaled point.
    pub fn value_scaled(&self, s: &[f64]) -> f64 {
        let p = dot(&self.pcoeff, &recurrence(s, &self.struct_p));
        let q = dot(&self.qcoeff, &recurrence(s, &self.struct_q));
        p / q
    }
}
