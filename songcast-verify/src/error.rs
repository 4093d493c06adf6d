use std::path::PathBuf;

use thiserror::Error;

/// Errors loading a test plan
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Cannot read test plan {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Test plan is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Parsed, but describes something that cannot be checked
    #[error("Invalid test plan: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, PlanError>;
