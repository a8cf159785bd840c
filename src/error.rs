use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which source dialect a parse failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Markup,
    Program,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Markup => write!(f, "markup"),
            Dialect::Program => write!(f, "program"),
        }
    }
}

/// Errors raised by the extraction engine.
///
/// `ParseFailure` is scoped to one file and never aborts a batch.
/// `MissingInput` and `InvalidStore` are setup failures and abort the run.
/// `ExpressionConflict` never leaves the markup extractor: the offending
/// text node is kept as-is.
#[derive(Debug, Error)]
pub enum AutokeyError {
    #[error("Parse error ({dialect}) in {path}: {message}")]
    ParseFailure {
        dialect: Dialect,
        path: String,
        message: String,
    },

    #[error("Interpolation expression contains translatable text: {expression}")]
    ExpressionConflict { expression: String },

    #[error("Missing input {}: {reason}", path.display())]
    MissingInput { path: PathBuf, reason: String },

    #[error("Invalid resource document {path}: {message}")]
    InvalidStore { path: String, message: String },
}

impl AutokeyError {
    pub fn parse_failure(dialect: Dialect, path: &str, message: impl Into<String>) -> Self {
        AutokeyError::ParseFailure {
            dialect,
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_store(path: &str, message: impl Into<String>) -> Self {
        AutokeyError::InvalidStore {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// True for failures that only affect the current file
    pub fn is_file_scoped(&self) -> bool {
        matches!(
            self,
            AutokeyError::ParseFailure { .. } | AutokeyError::ExpressionConflict { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AutokeyError>;
