use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for configuration, input, and output failures.
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("input '{}' is unusable: {reason}", path.display())]
    Input { path: PathBuf, reason: String },
    #[error("output directory '{}' already exists", .0.display())]
    OutputExists(PathBuf),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl PrepError {
    pub(crate) fn input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PrepError::Input {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
