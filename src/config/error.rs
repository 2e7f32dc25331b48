//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Manifest loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("error decoding manifest `{0}`")]
    Json(PathBuf, #[source] serde_json::Error),
}
