//! Error types for zsheet core.

use std::path::PathBuf;

use thiserror::Error;

use zsheet_engine::engine::EvalError;

/// Errors that can occur in the zsheet core
#[derive(Error, Debug)]
pub enum ZsheetError {
    #[error("Cell ({row}, {col}) is outside the {rows}x{cols} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Formula error: {0}")]
    Evaluation(#[from] EvalError),

    #[error("Not a number: {input:?}")]
    Parse { input: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unreadable file {}: {message}", path.display())]
    Format { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ZsheetError {
    pub(crate) fn format(path: &std::path::Path, message: impl Into<String>) -> Self {
        ZsheetError::Format {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ZsheetError>;

/// Shorten user input for log lines and status text.
pub(crate) fn snippet(input: &str) -> String {
    const MAX: usize = 32;
    if input.chars().count() <= MAX {
        input.to_string()
    } else {
        let head: String = input.chars().take(MAX).collect();
        format!("{head}…")
    }
}
