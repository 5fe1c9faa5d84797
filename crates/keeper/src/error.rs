//! Error types for the keeper service

use ramifi_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeeperError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Engine error: {0}")]
    Core(#[from] CoreError),

    #[error("Feed {path} line {line}: {reason}")]
    FeedError { path: String, line: usize, reason: String },

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type KeeperResult<T> = Result<T, KeeperError>;

impl KeeperError {
    /// Errors worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, KeeperError::IoError(_))
    }
}

impl From<std::io::Error> for KeeperError {
    fn from(err: std::io::Error) -> Self {
        KeeperError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for KeeperError {
    fn from(err: serde_json::Error) -> Self {
        KeeperError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for KeeperError {
    fn from(err: toml::de::Error) -> Self {
        KeeperError::SerializationError(err.to_string())
    }
}

impl From<toml::ser::Error> for KeeperError {
    fn from(err: toml::ser::Error) -> Self {
        KeeperError::SerializationError(err.to_string())
    }
}
