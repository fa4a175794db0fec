//! Error types shared across the crate.
//!
//! - `AppError`: what a binary ultimately reports (message + process exit code)
//! - `ValidationError`: malformed input rejected by the numeric cores
//! - `StepExecutionError`: a failed suite step, carrying whatever artifacts it
//!   produced before failing

use std::path::PathBuf;

use crate::domain::ArtifactMap;

/// Exit code for a validation failure or a fatal configuration problem.
pub const EXIT_INVALID: u8 = 2;

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

    pub fn message(&self) -> &str {
        &self.message
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

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::new(EXIT_INVALID, err.to_string())
    }
}

/// Input that cannot be evaluated.
///
/// Line numbers are 1-based file lines (the header is line 1).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("failed to read '{path}': {message}")]
    Read { path: PathBuf, message: String },

    #[error("missing required column `{0}`")]
    MissingColumn(String),

    #[error("line {line}: missing required value `{column}`")]
    MissingValue { line: usize, column: String },

    #[error("line {line}: `{column}` is not numeric: '{value}'")]
    NotNumeric {
        line: usize,
        column: String,
        value: String,
    },

    #[error("{context} must be > 0 (got {value})")]
    NonPositive { context: String, value: f64 },

    #[error("{context}: {message}")]
    OutOfRange { context: String, message: String },

    #[error("length mismatch: {what} ({left} vs {right})")]
    LengthMismatch {
        what: String,
        left: usize,
        right: usize,
    },

    #[error("{0}")]
    Invalid(String),
}

impl ValidationError {
    pub fn non_positive(context: impl Into<String>, value: f64) -> Self {
        ValidationError::NonPositive {
            context: context.into(),
            value,
        }
    }

    pub fn out_of_range(context: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::OutOfRange {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// A suite step failed.
///
/// Artifacts collected before the failure travel with the error so the
/// manifest can still list them.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct StepExecutionError {
    pub message: String,
    pub artifacts: ArtifactMap,
}

impl StepExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            artifacts: ArtifactMap::new(),
        }
    }

    pub fn with_artifacts(message: impl Into<String>, artifacts: ArtifactMap) -> Self {
        Self {
            message: message.into(),
            artifacts,
        }
    }
}

impl From<ValidationError> for StepExecutionError {
    fn from(err: ValidationError) -> Self {
        StepExecutionError::new(format!("validation error: {err}"))
    }
}

impl From<std::io::Error> for StepExecutionError {
    fn from(err: std::io::Error) -> Self {
        StepExecutionError::new(format!("I/O error: {err}"))
    }
}

impl From<serde_json::Error> for StepExecutionError {
    fn from(err: serde_json::Error) -> Self {
        StepExecutionError::new(format!("JSON error: {err}"))
    }
}

impl From<AppError> for StepExecutionError {
    fn from(err: AppError) -> Self {
        StepExecutionError::new(err.message)
    }
}
