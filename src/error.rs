//! Error types.
//!
//! - `ForecastError`: the library taxonomy returned by every modeling step.
//! - `AppError`: what the binary reports (message + process exit code).
//!
//! Exit codes:
//! - 2: caller/contract error (bad arguments, unknown columns, malformed grid, I/O)
//! - 3: the data cannot support the requested analysis
//! - 4: internal/numerical failure

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("transform pipeline is not fitted; call `fit` first")]
    NotFitted,

    #[error("no overlap between input and baseline for column `{0}`")]
    NoOverlap(String),

    #[error("unknown column: `{0}`")]
    UnknownColumn(String),

    #[error("exogenous candidates outside the allow-list: {0:?}")]
    InvalidExogVariable(Vec<String>),

    #[error("model fit failed: {0}")]
    ModelFit(String),

    #[error("missing future exogenous data for `{column}` at {date}")]
    MissingExogData { column: String, date: String },

    #[error("no viable model: all {0} candidates failed")]
    NoViableModel(usize),

    #[error("invalid parameter grid: {0}")]
    InvalidGrid(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ForecastError {
    /// Numerical/statistical failures that only disqualify a single grid candidate.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ForecastError::InsufficientData(_) | ForecastError::ModelFit(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;

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

impl From<ForecastError> for AppError {
    fn from(err: ForecastError) -> Self {
        let exit_code = match err {
            ForecastError::InsufficientData(_) | ForecastError::NoViableModel(_) => 3,
            ForecastError::ModelFit(_) => 4,
            _ => 2,
        };
        AppError::new(exit_code, err.to_string())
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

    #[test]
    fn numerical_failures_are_recoverable() {
        assert!(ForecastError::ModelFit("singular".into()).is_recoverable());
        assert!(ForecastError::InsufficientData("short".into()).is_recoverable());
        assert!(!ForecastError::UnknownColumn("X".into()).is_recoverable());
        assert!(!ForecastError::InvalidGrid("extra key".into()).is_recoverable());
    }

    #[test]
    fn app_error_exit_codes() {
        assert_eq!(AppError::from(ForecastError::NotFitted).exit_code(), 2);
        assert_eq!(AppError::from(ForecastError::NoViableModel(3)).exit_code(), 3);
        assert_eq!(AppError::from(ForecastError::ModelFit("x".into())).exit_code(), 4);
    }
}
