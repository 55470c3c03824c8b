//! Error types for devgrant.

use thiserror::Error;

use crate::auth::{AuthError, AuthStage};

/// Top-level error for configuration, persistence and flow orchestration.
#[derive(Error, Debug)]
pub enum DevgrantError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl DevgrantError {
    /// Flow stage that failed, when the error came from the device grant.
    pub fn stage(&self) -> Option<AuthStage> {
        match self {
            Self::Auth(err) => err.stage(),
            _ => None,
        }
    }
}

impl From<tokio::task::JoinError> for DevgrantError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Worker(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, DevgrantError>;
