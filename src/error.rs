//! Error types for the promptline job pipeline.

use crate::types::ResponseId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Storage-related errors (metadata rows and content files)
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Response not found: {0}")]
    ResponseNotFound(ResponseId),

    #[error("Content file missing: {0}")]
    ContentFileMissing(PathBuf),

    #[error("Malformed content file {path}: {reason}")]
    MalformedContentFile { path: PathBuf, reason: String },

    #[error("Metadata store error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Normalized provider failure classes.
///
/// `Timeout` and `Cancelled` together form the "timeout-or-cancelled" class, but stay
/// separate so a user cancel is never reported as a timeout failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Unauthorized,
    ModelNotFound,
    RateLimited,
    Timeout,
    Cancelled,
    ConnectionRefused,
    Unknown,
}

impl ProviderErrorKind {
    /// Stable code persisted on failed response rows.
    pub fn code(self) -> &'static str {
        match self {
            ProviderErrorKind::Unauthorized => "unauthorized",
            ProviderErrorKind::ModelNotFound => "model_not_found",
            ProviderErrorKind::RateLimited => "rate_limited",
            ProviderErrorKind::Timeout => "timeout",
            ProviderErrorKind::Cancelled => "cancelled",
            ProviderErrorKind::ConnectionRefused => "connection_refused",
            ProviderErrorKind::Unknown => "unknown",
        }
    }
}

/// Error returned by a provider adapter call.
#[derive(Debug, Clone, Error)]
#[error("{} ({})", message, kind.code())]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unauthorized, message)
    }

    pub fn model_not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::ModelNotFound, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ProviderErrorKind::Timeout,
            format!("Request timed out after {}s", after.as_secs_f32()),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ProviderErrorKind::Cancelled, "Request cancelled")
    }

    pub fn connection_refused(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::ConnectionRefused, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unknown, message)
    }

    pub fn is_timeout_or_cancelled(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::Timeout | ProviderErrorKind::Cancelled
        )
    }
}

/// Crate-level errors surfaced to callers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No active provider selected")]
    NoActiveProvider,

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Credentials unavailable for provider '{provider}': {reason}")]
    CredentialsUnavailable { provider: String, reason: String },

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Response not found: {0}")]
    ResponseNotFound(ResponseId),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
