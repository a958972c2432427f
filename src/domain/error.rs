//! Domain error types.

use crate::domain::validate::ValidationIssue;

/// Top-level error type for stratsim.
#[derive(Debug, thiserror::Error)]
pub enum StratsimError {
    #[error("strategy validation failed at {path}: {message}", path = .0.path, message = .0.message)]
    Validation(ValidationIssue),

    #[error("cannot compile strategy: {reason}")]
    Compile { reason: String },

    #[error("bad bar data at index {index}: {reason}")]
    Data { index: usize, reason: String },

    #[error("backtest cancelled")]
    Cancelled,

    #[error("strategy store error: {reason}")]
    Store { reason: String },

    #[error("bar source error: {reason}")]
    BarSource { reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&StratsimError> for std::process::ExitCode {
    fn from(err: &StratsimError) -> Self {
        let code: u8 = match err {
            StratsimError::Io(_) => 1,
            StratsimError::Json(_) => 2,
            StratsimError::Validation(_) | StratsimError::Compile { .. } => 3,
            StratsimError::Data { .. } | StratsimError::BarSource { .. } => 4,
            StratsimError::Store { .. } => 5,
            StratsimError::Cancelled => 6,
        };
        std::process::ExitCode::from(code)
    }
}
