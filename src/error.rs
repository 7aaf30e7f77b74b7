use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// A failed query against the spatial database.
#[derive(Debug, Error)]
#[error("{operation}: db returned error: {source}")]
pub struct QueryError {
    pub operation: &'static str,
    #[source]
    pub source: sqlx::Error,
}

impl QueryError {
    /// Builds a `map_err` adapter tagging the error with the operation name.
    pub fn during(operation: &'static str) -> impl FnOnce(sqlx::Error) -> QueryError {
        move |source| QueryError { operation, source }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid identifier {0:?}: expected lowercase letters, digits and underscores (max 63 bytes)")]
    InvalidIdentifier(String),

    #[error("unknown stage {0:?}")]
    UnknownStage(String),

    #[error("stages: {0}")]
    Stages(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("stage {stage}: {count} point(s) could not be snapped to a network node")]
    Unsnapped { stage: String, count: usize },

    #[error("{program} exited with {status}: {message}")]
    GridBuilder {
        program: String,
        status: String,
        message: String,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encoding vector layer: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("run cancelled")]
    Cancelled,
}

impl Error {
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Error {
        let path = path.into();
        move |source| Error::Io { path, source }
    }

    /// Cancellation aborts the run even inside collect-and-continue steps.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
