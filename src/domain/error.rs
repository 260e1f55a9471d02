use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum AppError {
    Internal(String),
    NotFound(String),
    ValidationError(String),
    ParseError(String),
    ConfigError(String),
    LLMError(String),
    /// Missing or rejected provider credential.
    Authentication(String),
    /// Backend refused the connection or timed out.
    Unavailable(String),
    /// The backend does not serve the requested model.
    ModelNotFound(String),
    UnknownModel(String),
    PersistenceError(String),
    CheckerInvocation(String),
    IoError(String),
}

impl AppError {
    /// True when a filesystem write was rejected for lack of permission.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, AppError::PersistenceError(msg) if msg.starts_with("Permission denied"))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::LLMError(msg) => write!(f, "LLM error: {}", msg),
            AppError::Authentication(msg) => write!(f, "Credential required: {}", msg),
            AppError::Unavailable(msg) => write!(f, "Backend unreachable: {}", msg),
            AppError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            AppError::UnknownModel(msg) => write!(f, "Unknown model: {}", msg),
            AppError::PersistenceError(msg) => write!(f, "Destination not writable: {}", msg),
            AppError::CheckerInvocation(msg) => write!(f, "Syntax checker failed: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
