//! Error types for the CLI.

use crate::args::{UsageError, USAGE};
use ncuscript_core::NcuError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid request in {path}: {source}")]
    Request {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Ncu(#[from] NcuError),
    #[error("Failed to encode result: {0}")]
    Output(#[source] serde_json::Error),
    #[error("Failed to initialise logging: {0}")]
    Telemetry(String),
}

impl CliError {
    /// Extra line shown under the error message, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Usage(_) => Some(USAGE),
            Self::Ncu(e) => Some(e.user_hint()),
            _ => None,
        }
    }
}
