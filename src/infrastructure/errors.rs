use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to the file system, the clipboard or the log sink.
#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid file format - {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Domain(#[from] crate::domain::DomainError),
}

impl InfrastructureError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InfrastructureError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type InfrastructureResult<T> = Result<T, InfrastructureError>;
