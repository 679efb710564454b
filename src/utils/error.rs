use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out waiting for data")]
    Timeout,

    #[error("Release feed error: {0}")]
    Feed(String),

    #[error("Insufficient disk space: {required} bytes required, {available} available")]
    DiskSpace { required: u64, available: u64 },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Corrupt artifact: {0}")]
    CorruptArtifact(String),

    #[error("Incompatible environment: {0}")]
    IncompatibleEnvironment(String),

    #[error("Install failed: {0}")]
    InstallFailure(String),

    #[error("Restart not supported: {0}")]
    RestartUnsupported(String),

    #[error("{0}")]
    Custom(String),
}

impl UpdateError {
    /// Transient errors are retried by the download manager; everything
    /// else surfaces to the scheduler on first occurrence. Connection
    /// failures and server-side errors retry; a 4xx will not improve on
    /// its own.
    pub fn is_transient(&self) -> bool {
        match self {
            UpdateError::Timeout => true,
            UpdateError::Network(e) => e
                .status()
                .map(|s| s.is_server_error())
                .unwrap_or(true),
            _ => false,
        }
    }
}

impl Serialize for UpdateError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type UpdateResult<T> = Result<T, UpdateError>;
