//! Unified application error model.
//! Every component surfaces one of these kinds rather than raw store/crypto
//! errors; the embedding API layer maps kinds to transport status codes.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Malformed or missing input; the caller must correct and retry.
    Validation { code: String, message: String },
    /// Unknown identity or token reference.
    NotFound { code: String, message: String },
    /// Duplicate request, already-friends, or username/email collision.
    Conflict { code: String, message: String },
    /// A token failed its signature, digest, or expiry check. The message is
    /// deliberately generic: callers are never told which check failed.
    InvalidOrExpired { code: String, message: String },
    /// Hashing or store failure; not recoverable by the caller.
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::InvalidOrExpired { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::InvalidOrExpired { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self {
        AppError::Validation { code: code.into(), message: msg.into() }
    }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self {
        AppError::NotFound { code: code.into(), message: msg.into() }
    }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self {
        AppError::Conflict { code: code.into(), message: msg.into() }
    }
    pub fn invalid_or_expired<S: Into<String>>(code: S, msg: S) -> Self {
        AppError::InvalidOrExpired { code: code.into(), message: msg.into() }
    }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self {
        AppError::Internal { code: code.into(), message: msg.into() }
    }

    /// Map to HTTP status code for the embedding API layer.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::InvalidOrExpired { .. } => 401,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}
