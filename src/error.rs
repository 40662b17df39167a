// Error taxonomy shared by every module. Each variant maps to one way a
// publish run can fail; none of them are retried.

use std::path::PathBuf;

/// Errors produced while validating input or publishing boxes.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Bad or missing command-line input.
    #[error("{0}")]
    Validation(String),

    /// Missing required environment configuration.
    #[error("{0}")]
    Configuration(String),

    /// A user or box does not exist on the registry.
    #[error("not found on registry: {0}")]
    NotFound(String),

    /// The registry rejected a request (version or provider creation, upload).
    #[error("{0}")]
    Registry(String),

    #[error("Unable to find {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Failed to release {tag} v{version}")]
    Release { tag: String, version: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
