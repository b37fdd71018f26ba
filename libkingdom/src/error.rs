//! Error types for Kingdom

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KingdomError>;

#[derive(Error, Debug)]
pub enum KingdomError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Account '{account_id}' is already connected on {platform}")]
    DuplicateAccount { platform: String, account_id: String },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

impl KingdomError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            KingdomError::Validation(_) => 3,
            KingdomError::Config(_) => 2,
            KingdomError::Storage(_)
            | KingdomError::NotFound(_)
            | KingdomError::DuplicateAccount { .. }
            | KingdomError::UnsupportedPlatform(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupted value under '{key}': {reason}")]
    Corrupted { key: String, reason: String },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Remote profile store unavailable: {0}")]
    Remote(String),
}

/// Input rejected before any side effect takes place
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Content text cannot be empty")]
    EmptyContent,

    #[error("At least one target platform is required")]
    NoTargets,

    #[error("Scheduled time must be in the future: {0}")]
    InvalidTime(String),

    #[error("Could not parse schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid account: {0}")]
    InvalidAccount(String),
}

/// Failure of a single distribution target
///
/// These never abort a distribution run; they are carried in the
/// corresponding [`PostResult`](crate::types::PostResult).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum TargetError {
    #[error("No account connected")]
    NoAccountConnected,

    #[error("Unsupported platform")]
    UnsupportedPlatform,

    #[error("Access token expired")]
    TokenExpired,

    #[error("{0}")]
    Adapter(String),

    /// The whole distribution was refused before any adapter ran
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Errors raised by platform adapters
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),
}

impl From<PlatformError> for TargetError {
    fn from(error: PlatformError) -> Self {
        TargetError::Adapter(error.to_string())
    }
}
