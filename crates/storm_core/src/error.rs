//! Error types for the core module.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while building or managing a project.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Store error: {0}")]
    Store(#[from] storm_store::StoreError),

    #[error("Runner error: {0}")]
    Runner(#[from] storm_runner::RunnerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("No active build for project: {0}")]
    BuildNotActive(String),

    #[error("Invalid state for {project_id}: {message}")]
    InvalidState { project_id: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<serde_yaml::Error> for CoreError {
    fn from(e: serde_yaml::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}
