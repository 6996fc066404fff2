//! Error types for NcuScript operations

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No API key configured (set NCUSCRIPT_API_KEY or api_key in the config file)")]
    MissingApiKey,

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Chat-completion provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("Request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Remote service returned status {status}: {message}")]
    RemoteService {
        status: u16,
        message: String,
        retry_after_ms: Option<i64>,
    },
}

/// Coarse error category, used by callers to pick what to show the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Transport,
    Authentication,
    RateLimited,
    RemoteService,
}

/// Master error type for all NcuScript errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NcuError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

impl NcuError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Llm(LlmError::Transport { .. }) => ErrorKind::Transport,
            Self::Llm(LlmError::RemoteService { status, .. }) => match status {
                401 | 403 => ErrorKind::Authentication,
                429 => ErrorKind::RateLimited,
                _ => ErrorKind::RemoteService,
            },
        }
    }

    /// Short, user-facing advice for this error.
    pub fn user_hint(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Configuration => "Check your API key and AI service configuration.",
            ErrorKind::Transport => {
                "Network issue: the AI service could not be reached. Check your connection and try again."
            }
            ErrorKind::Authentication => "The AI service rejected the API key. Check your API key.",
            ErrorKind::RateLimited => "Rate limited by the AI service. Wait a moment and try again.",
            ErrorKind::RemoteService => "The AI service returned an error. Try again later.",
        }
    }
}

/// Result type alias for NcuScript operations.
pub type NcuResult<T> = Result<T, NcuError>;

// =============================================================================
// TESTS
// =============================================================================
