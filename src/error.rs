use crate::domain::{IterationRecord, SolverStatus};

/// Errors raised by the fitting engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FitError {
    /// Malformed inputs, reported before any solver call.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The constrained fit step did not converge within its retry budget.
    ///
    /// `history` holds the passes completed before the failing one.
    #[error(
        "Constrained fit did not converge after {retries} randomized restarts (last status {}: {})",
        .status.status,
        .status.message
    )]
    SolverNonConvergence {
        retries: usize,
        status: SolverStatus,
        history: Vec<IterationRecord>,
    },

    /// The outer loop exhausted its iteration cap without certifying robustness.
    #[error(
        "Could not find a robust denominator after {} iterations (threshold {threshold})",
        .history.len()
    )]
    RobustnessNotAchieved {
        threshold: f64,
        history: Vec<IterationRecord>,
    },
}

impl FitError {
    /// Iteration history carried by a solver or robustness failure.
    pub fn history(&self) -> Option<&[IterationRecord]> {
        match self {
            FitError::SolverNonConvergence { history, .. } | FitError::RobustnessNotAchieved { history, .. } => {
                Some(history.as_slice())
            }
            FitError::InvalidConfiguration(_) => None,
        }
    }

    /// Pretty JSON of the carried iteration history.
    pub fn history_json(&self) -> Option<String> {
        self.history().and_then(|h| serde_json::to_string_pretty(h).ok())
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let code = match err {
            FitError::InvalidConfiguration(_) => 2,
            FitError::SolverNonConvergence { .. } => 3,
            FitError::RobustnessNotAchieved { .. } => 4,
        };
        AppError::new(code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: i32) -> SolverStatus {
        SolverStatus {
            message: "Iteration limit reached".into(),
            status: code,
            iterations: 1001,
            elapsed_secs: 0.5,
        }
    }

    #[test]
    fn fit_errors_map_to_exit_codes() {
        let cases = [
            (FitError::InvalidConfiguration("bad".into()), 2),
            (
                FitError::SolverNonConvergence {
                    retries: 3,
                    status: status(1),
                    history: vec![],
                },
                3,
            ),
            (FitError::RobustnessNotAchieved { threshold: 0.1, history: vec![] }, 4),
        ];
        for (err, code) in cases {
            assert_eq!(AppError::from(err).exit_code(), code);
        }
    }

    #[test]
    fn messages_carry_solver_details() {
        let err = FitError::SolverNonConvergence {
            retries: 3,
            status: status(1),
            history: vec![],
        };
        let text = err.to_string();
        assert!(text.contains("after 3 randomized restarts"));
        assert!(text.contains("last status 1: Iteration limit reached"));
        assert_eq!(err.history().map(|h| h.len()), Some(0));
        assert_eq!(err.history_json().as_deref(), Some("[]"));

        let invalid = FitError::InvalidConfiguration("bad".into());
        assert!(invalid.history().is_none());
        assert!(invalid.history_json().is_none());
    }

    #[test]
    fn robustness_failure_renders_history() {
        let err = FitError::RobustnessNotAchieved { threshold: 0.1, history: vec![] };
        assert_eq!(err.history().map(|h| h.len()), Some(0));
        assert_eq!(err.history_json().as_deref(), Some("[]"));
        assert!(err.to_string().contains("after 0 iterations"));
    }
}
