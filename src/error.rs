use std::sync::Arc;
use thiserror::Error;

/// Main error type for the netlog capture store
#[derive(Debug, Error)]
pub enum NetlogError {
    // File log errors
    #[error("Log file error: {0}")]
    LogFileError(String),

    #[error("Log rotation failed: {0}")]
    LogRotationError(String),

    #[error("Log directory error: {0}")]
    LogDirectoryError(String),

    // Per-entry persistence errors
    #[error("Failed to persist log entry {0}: {1}")]
    PersistError(String, String),

    #[error("Persisted entry not found: {0}")]
    EntryNotFound(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    // IO errors (automatically converted from std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for netlog operations
pub type Result<T> = std::result::Result<T, NetlogError>;

/// Hook through which a host application can observe failures that the
/// capture pipeline otherwise swallows (disk errors never propagate to
/// ingestion callers).
pub type DiagnosticHook = Arc<dyn Fn(&NetlogError) + Send + Sync>;
