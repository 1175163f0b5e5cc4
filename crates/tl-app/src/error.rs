//! Error types for the tl-app service layer.

use std::path::PathBuf;
use tl_kernel::KernelError;

/// Application error shared by the CLI and other front ends.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("Simulation is running in the background")]
    Busy,

    #[error(
        "No recorded run{}",
        .generation.map(|g| format!(" with generation {g}")).unwrap_or_default()
    )]
    NoData { generation: Option<usize> },

    #[error("Unknown demo '{name}' (available: {available})")]
    UnknownDemo { name: String, available: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to read config file: {path}")]
    ConfigFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Background run panicked")]
    WorkerPanicked,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for tl-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON: {err}"))
    }
}
